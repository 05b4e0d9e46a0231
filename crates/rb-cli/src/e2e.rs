use std::path::PathBuf;
use std::time::Duration;

use rb_core::scheduler::STATE_ATTR;
use rb_core::visibility::STYLESHEET_ID;
use serde_json::Value;
use thirtyfour::extensions::cdp::ChromeDevTools;
use thirtyfour::prelude::*;
use thirtyfour::ChromeCapabilities;

const HOME_URL: &str = "https://www.youtube.com/";

pub struct E2eOptions {
    pub chromedriver_url: String,
    pub extension_path: String,
    pub headless: bool,
}

pub fn run_e2e(opts: E2eOptions) -> Result<(), String> {
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| format!("Failed to start tokio runtime: {}", e))?;
    runtime.block_on(run_e2e_async(opts))
}

async fn run_e2e_async(opts: E2eOptions) -> Result<(), String> {
    let extension_path = canonicalize_path(&opts.extension_path)?;

    let mut caps = ChromeCapabilities::new();
    let mut args = vec![
        format!("--disable-extensions-except={}", extension_path.display()),
        format!("--load-extension={}", extension_path.display()),
        "--no-first-run".to_string(),
        "--no-default-browser-check".to_string(),
        "--disable-default-apps".to_string(),
    ];
    if opts.headless {
        args.push("--headless=new".to_string());
        args.push("--disable-gpu".to_string());
    }
    for arg in &args {
        caps.add_arg(arg)
            .map_err(|e| format!("Failed to set chrome arg: {}", e))?;
    }

    let driver = WebDriver::new(&opts.chromedriver_url, caps)
        .await
        .map_err(|e| format!("Failed to connect to chromedriver: {}", e))?;

    let cdp = ChromeDevTools::new(driver.handle.clone());
    tokio::time::sleep(Duration::from_secs(1)).await;

    let mut errors = Vec::new();

    match find_extension_id(&cdp).await {
        Some(extension_id) => {
            if let Err(e) = check_page_has_selector(
                &driver,
                &format!("chrome-extension://{}/popup.html", extension_id),
                "#minViews",
            )
            .await
            {
                errors.push(format!("Settings page check failed: {}", e));
            }
        }
        None => errors.push("Failed to locate extension service worker".to_string()),
    }

    if let Err(e) = check_content_script(&driver).await {
        errors.push(format!("Content script check failed: {}", e));
    }

    driver.quit().await.ok();

    if errors.is_empty() {
        println!("✓ E2E checks passed");
        Ok(())
    } else {
        Err(format!("E2E failed:\n- {}", errors.join("\n- ")))
    }
}

async fn find_extension_id(cdp: &ChromeDevTools) -> Option<String> {
    let targets = cdp.execute_cdp("Target.getTargets").await.ok()?;
    let infos = targets.get("targetInfos")?.as_array()?;
    for info in infos {
        let target_type = info.get("type").and_then(Value::as_str).unwrap_or("");
        let url = info.get("url").and_then(Value::as_str).unwrap_or("");
        let is_background = target_type == "service_worker" || target_type == "background_page";
        if is_background && url.starts_with("chrome-extension://") {
            let id = url.trim_start_matches("chrome-extension://");
            if let Some(id) = id.split('/').next() {
                if !id.is_empty() {
                    return Some(id.to_string());
                }
            }
        }
    }
    None
}

async fn check_page_has_selector(driver: &WebDriver, url: &str, selector: &str) -> WebDriverResult<()> {
    driver.goto(url).await?;
    driver.find(By::Css(selector)).await?;
    Ok(())
}

async fn check_content_script(driver: &WebDriver) -> Result<(), String> {
    driver.goto(HOME_URL)
        .await
        .map_err(|e| format!("Failed to navigate to {}: {}", HOME_URL, e))?;
    tokio::time::sleep(Duration::from_secs(3)).await;

    let styled = eval_bool(
        driver,
        &format!("return document.getElementById('{}') !== null;", STYLESHEET_ID),
    )
    .await
    .map_err(|e| format!("Failed to read stylesheet state: {}", e))?;
    if !styled {
        return Err("Content script did not install its stylesheet".to_string());
    }

    let marked = eval_bool(
        driver,
        &format!("return document.querySelector('[{}]') !== null;", STATE_ATTR),
    )
    .await
    .map_err(|e| format!("Failed to read scan markers: {}", e))?;
    if !marked {
        return Err("No listing items were registered".to_string());
    }
    Ok(())
}

async fn eval_bool(driver: &WebDriver, script: &str) -> WebDriverResult<bool> {
    let result = driver.execute(script, Vec::<Value>::new()).await?;
    Ok(result.json().as_bool().unwrap_or(false))
}

fn canonicalize_path(path: &str) -> Result<PathBuf, String> {
    std::fs::canonicalize(path)
        .map_err(|e| format!("Failed to resolve '{}': {}", path, e))
}
