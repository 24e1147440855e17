//! Injected JavaScript for resolving and acting on page elements.
//!
//! Every call ships the resolver with it, so nothing has to survive a
//! navigation.

use serde::Deserialize;
use serde_json::Value;

use super::selectors::{Locator, MARK_ATTR};

const RESOLVER: &str = r#"
const visible = (el) => {
    if (!el) return false;
    const style = window.getComputedStyle(el);
    if (style.visibility === 'hidden' || style.display === 'none') return false;
    return !!(el.offsetWidth || el.offsetHeight || el.getClientRects().length);
};
const text = (el) => (el.innerText || el.value || el.textContent || '').trim();
const bare = (s) => s.replace(/[\s*:]+$/, '').trim();
const labelled = (root, wanted) => {
    const labels = Array.from(root.querySelectorAll('label'));
    const pick = (match) => labels.filter(match).map((l) =>
        l.htmlFor ? document.getElementById(l.htmlFor) : l.querySelector('input, select, textarea')
    ).filter(Boolean);
    const exact = pick((l) => bare(text(l)) === wanted);
    if (exact.length) return exact;
    const aria = Array.from(root.querySelectorAll('[aria-label]'))
        .filter((el) => el.getAttribute('aria-label').trim() === wanted);
    return aria.length ? aria : pick((l) => text(l).includes(wanted));
};
const all = (loc) => {
    const root = loc.scope ? document.querySelector(loc.scope) : document;
    if (!root) return [];
    switch (loc.by) {
        case 'css': return Array.from(root.querySelectorAll(loc.css));
        case 'nth': {
            const found = root.querySelectorAll(loc.css)[loc.index];
            return found ? [found] : [];
        }
        case 'text': return Array.from(root.querySelectorAll(loc.css)).filter((el) => text(el).includes(loc.text));
        case 'link': return Array.from(root.querySelectorAll('a, [role=link]')).filter((el) => text(el).includes(loc.text));
        case 'button': return Array.from(root.querySelectorAll('button, input[type=button], input[type=submit], [role=button]'))
            .filter((el) => text(el).includes(loc.text));
        case 'label': return labelled(root, loc.text);
    }
    return [];
};
const find = (loc) => {
    const found = all(loc);
    return found.find(visible) || found[0] || null;
};
const notify = (el) => {
    el.dispatchEvent(new Event('input', { bubbles: true }));
    el.dispatchEvent(new Event('change', { bubbles: true }));
};
"#;

const ACTIONS: &str = r#"
if (action === 'count') return { ok: true, value: all(loc).length };
if (action === 'loader_cleared') {
    const loader = document.querySelector(arg);
    return { ok: true, value: !loader || loader.classList.contains('d-none') || !visible(loader) };
}
if (action === 'present') return { ok: true, value: document.querySelector(arg) !== null };
if (action === 'blur') {
    if (document.activeElement && document.activeElement.blur) document.activeElement.blur();
    document.body.focus();
    return { ok: true };
}
const el = find(loc);
if (action === 'visible') return { ok: true, value: visible(el) };
if (action === 'read') return { ok: true, value: el ? el.getAttribute('value') : null, found: !!el };
if (!el) return { ok: false, error: 'not found' };
switch (action) {
    case 'select': {
        const option = Array.from(el.options || []).find((o) => o.value === arg);
        if (!option) return { ok: false, error: 'option unavailable' };
        el.value = arg;
        notify(el);
        return { ok: true };
    }
    case 'fill':
        el.focus();
        el.value = arg;
        notify(el);
        return { ok: true };
    case 'clear':
        el.focus();
        el.value = '';
        notify(el);
        return { ok: true };
    case 'checked': return { ok: true, value: !!el.checked };
    case 'force_click':
        el.click();
        return { ok: true };
    case 'mark':
        document.querySelectorAll('[MARK]').forEach((m) => m.removeAttribute('MARK'));
        el.setAttribute('MARK', '1');
        el.scrollIntoView({ block: 'center' });
        return { ok: true };
}
return { ok: false, error: 'unknown action ' + action };
"#;

/// Reply of an injected action.
#[derive(Debug, Deserialize)]
pub struct Reply {
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub value: Value,
    #[serde(default)]
    pub found: bool,
}

/// Actions understood by the injected script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Count,
    LoaderCleared,
    Present,
    Blur,
    Visible,
    Read,
    Select,
    Fill,
    Clear,
    Checked,
    ForceClick,
    Mark,
}

impl Action {
    fn name(&self) -> &'static str {
        match self {
            Action::Count => "count",
            Action::LoaderCleared => "loader_cleared",
            Action::Present => "present",
            Action::Blur => "blur",
            Action::Visible => "visible",
            Action::Read => "read",
            Action::Select => "select",
            Action::Fill => "fill",
            Action::Clear => "clear",
            Action::Checked => "checked",
            Action::ForceClick => "force_click",
            Action::Mark => "mark",
        }
    }
}

/// Build an expression that runs `action` on the element `locator` finds.
pub fn build(action: Action, locator: Option<&Locator>, arg: &str) -> String {
    let loc = locator
        .and_then(|l| serde_json::to_string(l).ok())
        .unwrap_or_else(|| "null".to_string());
    let arg = Value::String(arg.to_string());
    format!(
        "(function(loc, action, arg) {{{}{}}})({}, {}, {})",
        RESOLVER,
        ACTIONS.replace("MARK", MARK_ATTR),
        loc,
        Value::String(action.name().to_string()),
        arg
    )
}

/// Resolves once the document is interactive, or after `fallback_ms`.
pub fn ready_state(fallback_ms: u64) -> String {
    format!(
        r#"new Promise((resolve) => {{
            if (document.readyState === 'complete' || document.readyState === 'interactive') {{
                resolve(document.readyState);
            }} else {{
                document.addEventListener('DOMContentLoaded', () => resolve(document.readyState));
                setTimeout(() => resolve('timeout'), {});
            }}
        }})"#,
        fallback_ms
    )
}

/// CSS selector of the element tagged by [`Action::Mark`].
pub fn marked() -> String {
    format!("[{}='1']", MARK_ATTR)
}
