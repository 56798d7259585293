use crate::constants::STATUS_ID;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use web_sys as web;

#[inline]
pub fn window_document() -> Option<web::Document> {
    web::window().and_then(|w| w.document())
}

/// Calls `handler` with the selected value whenever the `<select>` changes.
pub fn add_select_listener(
    document: &web::Document,
    element_id: &str,
    mut handler: impl FnMut(String) + 'static,
) {
    let Some(select) = document
        .get_element_by_id(element_id)
        .and_then(|el| el.dyn_into::<web::HtmlSelectElement>().ok())
    else {
        log::warn!("[dom] missing #{}", element_id);
        return;
    };
    let target = select.clone();
    let closure = Closure::wrap(Box::new(move || handler(target.value())) as Box<dyn FnMut()>);
    let _ = select.add_event_listener_with_callback("change", closure.as_ref().unchecked_ref());
    closure.forget();
}

/// Sets the initial choice of a `<select>` without firing `change`.
pub fn set_select_value(document: &web::Document, element_id: &str, value: &str) {
    if let Some(select) = document
        .get_element_by_id(element_id)
        .and_then(|el| el.dyn_into::<web::HtmlSelectElement>().ok())
    {
        select.set_value(value);
    }
}

pub fn add_pointer_listener(
    target: &web::HtmlCanvasElement,
    event: &str,
    mut handler: impl FnMut(web::PointerEvent) + 'static,
) {
    let closure = Closure::wrap(Box::new(move |ev: web::PointerEvent| handler(ev))
        as Box<dyn FnMut(web::PointerEvent)>);
    let _ = target.add_event_listener_with_callback(event, closure.as_ref().unchecked_ref());
    closure.forget();
}

pub fn set_status(text: &str) {
    if let Some(el) = window_document().and_then(|d| d.get_element_by_id(STATUS_ID)) {
        el.set_text_content(Some(text));
    }
}

/// Text content of an inline `<script type="application/json">` block, if present.
pub fn json_block(document: &web::Document, element_id: &str) -> Option<String> {
    document
        .get_element_by_id(element_id)
        .and_then(|el| el.text_content())
        .filter(|t| !t.trim().is_empty())
}
