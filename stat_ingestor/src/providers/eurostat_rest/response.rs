use serde_json::Value;

/// Decoded shape of one response body.
///
/// The dissemination API serves a bare JSON-stat dataset at the root. Larger
/// extractions arrive wrapped as `{"data": <jsonstat>, "next_page_token":
/// ...}`; the token's absence is one of the two end-of-data signals (the
/// other being an empty dataset).
#[derive(Debug)]
pub struct PageBody {
    /// The JSON-stat dataset for this page.
    pub dataset: Value,
    /// Opaque continuation token, present when more pages exist.
    pub next_page_token: Option<String>,
}

/// Parses a response body into a [`PageBody`].
///
/// Returns the serde error untouched so the caller can wrap it with dataset
/// and page context.
pub fn parse_page(body: &[u8]) -> Result<PageBody, serde_json::Error> {
    let root: Value = serde_json::from_slice(body)?;

    if let Some(dataset) = root.get("data") {
        let next_page_token = root
            .get("next_page_token")
            .and_then(Value::as_str)
            .map(str::to_string);
        return Ok(PageBody {
            dataset: dataset.clone(),
            next_page_token,
        });
    }

    Ok(PageBody {
        dataset: root,
        next_page_token: None,
    })
}
