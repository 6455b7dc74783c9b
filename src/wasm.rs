use crate::ConvertOptions;
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
pub fn convert_project_json(json: &str) -> Result<String, JsValue> {
    crate::convert_project_json(json, None, &ConvertOptions::default())
        .map(|conversion| conversion.program.source)
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

#[wasm_bindgen]
pub fn convert_sb3(bytes: &[u8]) -> Result<String, JsValue> {
    crate::convert_bytes(bytes, None, &ConvertOptions::default())
        .map(|conversion| conversion.program.source)
        .map_err(|e| JsValue::from_str(&format!("{:#}", e)))
}
