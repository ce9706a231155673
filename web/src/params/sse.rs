use utoipa::IntoParams;

/// Query parameters accepted when opening an event stream
///
/// # Fields
///
/// * `ssetoken` - The signed, short-lived token identifying the user. A missing token is
///   treated the same as an invalid one.
#[derive(Debug, Default, IntoParams)]
#[into_params(parameter_in = Query)]
pub(crate) struct SseTokenParams {
    /// Signed SSE token issued by the backend application
    pub(crate) ssetoken: Option<String>,
}

impl SseTokenParams {
    /// Takes the first `ssetoken` of the query string. Repeated keys are ignored rather than
    /// rejected so a malformed query still ends in the same unauthorized response.
    pub(crate) fn from_query_pairs(pairs: Vec<(String, String)>) -> Self {
        let ssetoken = pairs
            .into_iter()
            .find(|(key, _)| key == "ssetoken")
            .map(|(_, value)| value);
        Self { ssetoken }
    }
}
