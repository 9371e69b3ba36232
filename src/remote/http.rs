use super::*;

/// Upstream responses larger than this fail with a transport error.
const MAX_RESPONSE_BYTES: usize = 10 * 1024 * 1024;

impl RemoteClient<'_> {
    /// Unconditional GET. Carries `Authorization: token <value>` using the
    /// override when given (the authentication path supplies the caller's
    /// token), else the configured one.
    pub fn get_uncached(&self, url: &str, token_override: Option<&str>) -> Result<ApiResponse> {
        let token = token_override.unwrap_or(&self.config.token);

        tracing::info!(url, "http get");

        let resp = self
            .client
            .get(url)
            .header(reqwest::header::AUTHORIZATION, format!("token {}", token))
            .send()
            .map_err(|e| Error::Transport(format!("get {}: {}", url, e)))?;

        let status = resp.status().as_u16();
        let bytes = resp
            .bytes()
            .map_err(|e| Error::Transport(format!("read body of {}: {}", url, e)))?;

        if bytes.len() > MAX_RESPONSE_BYTES {
            return Err(Error::Transport(format!(
                "response for {} is too large ({} bytes)",
                url,
                bytes.len()
            )));
        }

        let body = String::from_utf8(bytes.to_vec())
            .map_err(|e| Error::Parse(format!("body of {} is not utf-8: {}", url, e)))?;

        tracing::info!(status, bytes = body.len(), "http response");

        Ok(ApiResponse { body, status })
    }
}
