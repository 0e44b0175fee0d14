use reqwest::Url;

use crate::QueryError;

/// Build the bulk download link for a stream:
/// `{endpoint}/v1/logs/{stream_id}/download?q=<query>&end=<minutes>`.
///
/// The viewer only hands this URL off; the request itself needs a bearer token.
pub fn download_url(
    endpoint: &str,
    stream_id: &str,
    query: &str,
    end_minutes: u64,
) -> Result<Url, QueryError> {
    let mut url = Url::parse(endpoint).map_err(|e| QueryError::InvalidEndpoint(e.to_string()))?;

    url.path_segments_mut()
        .map_err(|_| QueryError::InvalidEndpoint(endpoint.to_string()))?
        .pop_if_empty()
        .extend(["v1", "logs", stream_id, "download"]);

    url.query_pairs_mut()
        .append_pair("q", query)
        .append_pair("end", &end_minutes.to_string());

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_url_encodes_query() {
        let url = download_url(
            "https://console.example.com",
            "prod",
            r#"{namespace="prod"} |~ "timeout""#,
            30,
        )
        .unwrap();

        assert_eq!(url.path(), "/v1/logs/prod/download");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("q".to_string(), r#"{namespace="prod"} |~ "timeout""#.to_string()),
                ("end".to_string(), "30".to_string()),
            ]
        );
    }

    #[test]
    fn test_download_url_escapes_stream_id() {
        let url = download_url("http://localhost:4000/", "a/b", "{}", 5).unwrap();
        assert_eq!(url.path(), "/v1/logs/a%2Fb/download");
    }

    #[test]
    fn test_download_url_rejects_relative_endpoint() {
        assert!(matches!(
            download_url("console", "prod", "{}", 5),
            Err(QueryError::InvalidEndpoint(_))
        ));
    }
}
