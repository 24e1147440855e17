//! Evasions installed on every new document of the filing page.

/// Desktop Chrome on Linux.
pub const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Chrome flags that hide the automation banner and keep containers happy.
pub const CHROME_FLAGS: &[&str] = &[
    "--disable-blink-features=AutomationControlled",
    "--disable-infobars",
    "--disable-dev-shm-usage",
    "--no-first-run",
    "--no-default-browser-check",
    "--disable-sync",
    "--disable-translate",
    "--no-sandbox",
    "--disable-gpu",
];

const PATCHES: &[&str] = &[
    // navigator.webdriver
    r#"Object.defineProperty(navigator, 'webdriver', { get: () => undefined, configurable: true });"#,
    r#"window.chrome = window.chrome || { runtime: {}, loadTimes() {}, csi() {}, app: {} };"#,
    r#"
    const query = window.navigator.permissions && window.navigator.permissions.query;
    if (query) {
        window.navigator.permissions.query = (p) => p.name === 'notifications'
            ? Promise.resolve({ state: Notification.permission })
            : query.call(window.navigator.permissions, p);
    }
    "#,
    r#"
    Object.defineProperty(navigator, 'plugins', {
        get: () => [
            { name: 'Chrome PDF Plugin', filename: 'internal-pdf-viewer', description: 'Portable Document Format' },
            { name: 'Chrome PDF Viewer', filename: 'mhjfbmdgcfjbbpaeojofohoefgiehjai', description: '' },
        ],
        configurable: true,
    });
    "#,
    // the portal is served in Kazakh and Russian
    r#"Object.defineProperty(navigator, 'languages', { get: () => ['kk-KZ', 'ru-RU', 'ru'], configurable: true });"#,
];

/// All patches as one script, each isolated so a failing one does not
/// stop the rest.
pub fn bundle() -> String {
    PATCHES
        .iter()
        .map(|patch| format!("try {{ {} }} catch (e) {{}}", patch.trim()))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundle_wraps_each_patch() {
        let script = bundle();
        assert_eq!(script.matches("try {").count(), PATCHES.len());
        assert!(script.contains("webdriver"));
    }
}
