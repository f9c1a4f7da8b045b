use std::str::FromStr;

use axum::{
    extract::{multipart::MultipartError, Multipart},
    http::StatusCode,
    Json,
};
use shared::{
    domain::Side,
    error::ApiError,
    protocol::{ImageUpload, VariationForm},
};

use crate::reject;

/// Reads the create/update variation form from a multipart body.
///
/// `tutorials` may repeat (also accepted as `tutorials[]`). An `image` part
/// without a filename or without content counts as no image.
pub(crate) async fn read_variation_form(
    mut multipart: Multipart,
) -> Result<VariationForm, (StatusCode, Json<ApiError>)> {
    let mut form = VariationForm::default();

    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(malformed)?;
                if !filename.is_empty() && !bytes.is_empty() {
                    form.image = Some(ImageUpload {
                        filename,
                        bytes: bytes.to_vec(),
                    });
                }
            }
            _ => {
                let value = field.text().await.map_err(malformed)?;
                apply_text_field(&mut form, &name, value)?;
            }
        }
    }

    Ok(form)
}

fn apply_text_field(
    form: &mut VariationForm,
    name: &str,
    value: String,
) -> Result<(), (StatusCode, Json<ApiError>)> {
    match name {
        "name" => form.name = Some(value),
        "side" if value.trim().is_empty() => form.side = None,
        "side" => {
            let side = Side::from_str(value.trim())
                .map_err(|e| reject(ApiError::validation(e.to_string())))?;
            form.side = Some(side);
        }
        "moves" => form.moves = value,
        "notes" => form.notes = Some(value),
        "variation_name" => form.variation_name = Some(value),
        "tutorials" | "tutorials[]" => form.tutorials.push(value),
        "delete_image" => form.delete_image = value.trim().eq_ignore_ascii_case("true"),
        _ => {}
    }
    Ok(())
}

fn malformed(err: MultipartError) -> (StatusCode, Json<ApiError>) {
    (
        err.status(),
        Json(ApiError::validation(format!("malformed form data: {}", err.body_text()))),
    )
}
