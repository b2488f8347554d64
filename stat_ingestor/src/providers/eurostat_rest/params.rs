use indexmap::IndexMap;

use crate::models::request::FetchRequest;

/// Builds the exact query parameters for one page of one request.
///
/// Layering order: descriptor defaults first, caller overrides on top (an
/// override replaces a default in place, keeping its position so request
/// URLs stay reproducible), then the wire format and page index.
pub fn construct_params(request: &FetchRequest, page: u32) -> IndexMap<String, String> {
    let mut params = request.descriptor.default_params.clone();
    for (key, value) in &request.overrides {
        params.insert(key.clone(), value.clone());
    }
    params.insert("format".to_string(), "JSON".to_string());
    params.insert("page".to_string(), page.to_string());
    params
}

/// Renders params as `k=v&k=v` for error messages and logs.
pub fn render_query(params: &IndexMap<String, String>) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{DatasetDescriptor, DatasetKind, DimensionMap};

    fn descriptor() -> DatasetDescriptor {
        DatasetDescriptor {
            id: "demo_pjan".to_string(),
            kind: DatasetKind::Demographic,
            dims: DimensionMap::default(),
            default_params: [("unit".to_string(), "NR".to_string())]
                .into_iter()
                .collect(),
            value_field: "value".to_string(),
        }
    }

    #[test]
    fn overrides_win_over_defaults() {
        let request = FetchRequest::for_descriptor(&descriptor())
            .with_param("unit", "PC")
            .with_param("geo", "DE");
        let params = construct_params(&request, 0);

        assert_eq!(params.get("unit").map(String::as_str), Some("PC"));
        assert_eq!(params.get("geo").map(String::as_str), Some("DE"));
        assert_eq!(params.get("page").map(String::as_str), Some("0"));
        assert_eq!(params.get("format").map(String::as_str), Some("JSON"));
    }

    #[test]
    fn page_index_is_per_call() {
        let request = FetchRequest::for_descriptor(&descriptor());
        assert_eq!(
            construct_params(&request, 3).get("page").map(String::as_str),
            Some("3")
        );
    }

    #[test]
    fn query_rendering_is_ordered() {
        let request = FetchRequest::for_descriptor(&descriptor()).with_param("geo", "DE");
        let q = render_query(&construct_params(&request, 1));
        assert_eq!(q, "unit=NR&geo=DE&format=JSON&page=1");
    }
}
