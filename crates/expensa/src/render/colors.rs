//! Outline colors for annotated fields.

use image::Rgba;

/// Shared by every line-item field.
pub const LINE_ITEM_COLOR: Rgba<u8> = Rgba([255, 165, 0, 255]);

/// Used for a summary field without an assigned color.
pub const FALLBACK_COLOR: Rgba<u8> = Rgba([255, 255, 255, 255]);

pub fn summary_field_color(field_type: &str) -> Rgba<u8> {
    match field_type {
        "INVOICE_RECEIPT_DATE" => Rgba([0, 123, 255, 255]),
        "INVOICE_RECEIPT_ID" => Rgba([167, 252, 0, 255]),
        "VENDOR_NAME" => Rgba([80, 200, 120, 255]),
        "RECEIVER_NAME" => Rgba([255, 0, 79, 255]),
        "PO_NUMBER" => Rgba([255, 0, 255, 255]),
        "TOTAL" => Rgba([233, 116, 81, 255]),
        "SUBTOTAL" => Rgba([226, 185, 247, 255]),
        "TAX" => Rgba([191, 0, 255, 255]),
        "VENDOR_VAT_NUMBER" => Rgba([242, 92, 84, 255]),
        "RECEIVER_VAT_NUMBER" => Rgba([87, 204, 153, 255]),
        _ => FALLBACK_COLOR,
    }
}
