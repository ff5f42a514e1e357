#![forbid(unsafe_code)]

//! `wasm-bindgen` exports.
//!
//! Only compiled on `wasm32` targets.

use std::cell::RefCell;

use js_sys::Reflect;
use tracing::Level;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

use super::active::ActiveOverlay;
use super::host::{SharedController, WebHost, mount};
use super::logging::{ConsoleLayer, ConsoleSink};
use super::options::parse_options;
use super::state_name;

fn console_write(method: &str, msg: &str) {
    let global = js_sys::global();
    let Ok(console) = Reflect::get(&global, &"console".into()) else {
        return;
    };
    let Ok(write) = Reflect::get(&console, &method.into()) else {
        return;
    };
    let Ok(write_fn) = write.dyn_into::<js_sys::Function>() else {
        return;
    };
    let _ = write_fn.call1(&console, &JsValue::from_str(msg));
}

fn console_error(msg: &str) {
    console_write("error", msg);
}

/// `console.*` sink for the tracing layer.
struct BrowserConsole;

impl ConsoleSink for BrowserConsole {
    fn write_line(&self, level: Level, line: &str) {
        let method = match level {
            Level::ERROR => "error",
            Level::WARN => "warn",
            Level::INFO => "info",
            Level::DEBUG | Level::TRACE => "debug",
        };
        console_write(method, line);
    }
}

fn install_panic_hook() {
    use std::sync::Once;

    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        std::panic::set_hook(Box::new(|info| {
            let msg = if let Some(loc) = info.location() {
                format!(
                    "panic at {}:{}:{}: {info}",
                    loc.file(),
                    loc.line(),
                    loc.column()
                )
            } else {
                format!("panic: {info}")
            };
            console_error(&msg);
        }));
    });
}

/// Install the console subscriber. The first caller's level wins.
fn install_logging(level: LevelFilter) {
    use std::sync::Once;

    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        let layer = ConsoleLayer::new(BrowserConsole).with_filter(level);
        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            console_write("debug", "findfont: a global tracing subscriber is already set");
        }
    });
}

thread_local! {
    /// The handle whose controller may own widgets on this page.
    static ACTIVE: RefCell<ActiveOverlay<WebHost>> = const { RefCell::new(ActiveOverlay::new()) };
}

fn claim(controller: &SharedController) {
    ACTIVE.with(|slot| slot.borrow_mut().claim(controller));
}

#[wasm_bindgen(start)]
pub fn wasm_start() {
    install_panic_hook();
}

/// Font inspector overlay bound to the current page.
///
/// Only one handle owns widgets at a time. Constructing a handle, or calling
/// `init()` on an older one, destroys the overlay of whichever handle held
/// the page before.
///
/// ```js
/// const overlay = new FindFont({ debounce: 200, logLevel: "debug" });
/// overlay.init();
/// ```
#[wasm_bindgen]
pub struct FindFont {
    inner: SharedController,
}

fn busy() -> JsValue {
    JsValue::from_str("FindFont is busy handling an event")
}

#[wasm_bindgen]
impl FindFont {
    /// Create an overlay for this page. Nothing is attached until `init()`.
    ///
    /// `options` is an optional plain object; see the crate docs for keys.
    #[wasm_bindgen(constructor)]
    pub fn new(options: JsValue) -> Result<FindFont, JsValue> {
        install_panic_hook();
        let json = if options.is_undefined() || options.is_null() {
            String::new()
        } else {
            js_sys::JSON::stringify(&options)
                .ok()
                .and_then(|json| json.as_string())
                .unwrap_or_default()
        };
        let options = parse_options(&json).map_err(|err| JsValue::from_str(&err.to_string()))?;
        install_logging(options.log_level);
        let inner = mount(options.config).map_err(|err| JsValue::from_str(&err.to_string()))?;
        claim(&inner);
        Ok(Self { inner })
    }

    /// Attach the widgets and listeners. Safe to call repeatedly, and again
    /// after `destroy()`.
    pub fn init(&self) -> Result<(), JsValue> {
        claim(&self.inner);
        self.inner.try_borrow_mut().map_err(|_| busy())?.initialize();
        Ok(())
    }

    /// Detach everything. Safe to call repeatedly.
    pub fn destroy(&self) -> Result<(), JsValue> {
        self.inner.try_borrow_mut().map_err(|_| busy())?.destroy();
        Ok(())
    }

    /// `"idle"`, `"buttonShown"`, `"panelOpen"` or `"destroyed"`.
    pub fn state(&self) -> Result<String, JsValue> {
        let overlay = self.inner.try_borrow().map_err(|_| busy())?;
        Ok(state_name(overlay.state()).to_owned())
    }

    /// The last detected font record, or `null`.
    #[wasm_bindgen(js_name = lastFontInfo)]
    pub fn last_font_info(&self) -> Result<JsValue, JsValue> {
        let overlay = self.inner.try_borrow().map_err(|_| busy())?;
        let Some(info) = overlay.last_detected() else {
            return Ok(JsValue::NULL);
        };
        let json =
            serde_json::to_string(info).map_err(|err| JsValue::from_str(&err.to_string()))?;
        js_sys::JSON::parse(&json)
    }
}

impl Drop for FindFont {
    fn drop(&mut self) {
        if let Ok(mut overlay) = self.inner.try_borrow_mut() {
            overlay.destroy();
        }
        let _ = ACTIVE.try_with(|slot| {
            if let Ok(mut slot) = slot.try_borrow_mut() {
                slot.release(&self.inner);
            }
        });
    }
}
