/// The kind of fetch being performed (§4.4), distinguishing which Pacer
/// tiers apply — Tier-2 list pacing applies only to `List`; Tier-3 is the
/// Worker's own responsibility and is acquired before `Fetch` is even
/// called for `Detail` (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    List,
    Detail,
}

/// The outcome classification of one logical fetch (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Ok,
    Transient,
    PermanentNotFound,
    Blocked,
    ClientError,
    NetworkError,
}

impl Classification {
    /// Whether Fetcher's retry loop should attempt again after this
    /// classification (§4.4).
    pub fn should_retry(self) -> bool {
        matches!(self, Self::Transient)
    }
}

/// Classifies one raw HTTP response per the rules of §4.4. `status = None`
/// signals a network/timeout failure.
pub fn classify(status: Option<u16>, body: &[u8], block_page_signature: Option<&str>) -> Classification {
    let Some(status) = status else {
        return Classification::NetworkError;
    };

    match status {
        200 => Classification::Ok,
        404 => Classification::PermanentNotFound,
        403 => Classification::Blocked,
        500..=599 => {
            let is_block_page = block_page_signature
                .map(|marker| body_contains(body, marker))
                .unwrap_or(false);
            if status == 500 && is_block_page {
                Classification::Blocked
            } else {
                Classification::Transient
            }
        }
        429 => Classification::Transient,
        _ => Classification::ClientError,
    }
}

fn body_contains(body: &[u8], marker: &str) -> bool {
    let Ok(body) = std::str::from_utf8(body) else {
        return false;
    };
    body.contains(marker)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_is_200() {
        assert_eq!(classify(Some(200), b"", None), Classification::Ok);
    }

    #[test]
    fn not_found_does_not_retry() {
        let c = classify(Some(404), b"", None);
        assert_eq!(c, Classification::PermanentNotFound);
        assert!(!c.should_retry());
    }

    #[test]
    fn forbidden_is_blocked() {
        assert_eq!(classify(Some(403), b"", None), Classification::Blocked);
    }

    #[test]
    fn server_error_with_block_signature_is_blocked() {
        let c = classify(Some(500), b"please verify you are human", Some("verify you are human"));
        assert_eq!(c, Classification::Blocked);
    }

    #[test]
    fn plain_server_error_is_transient() {
        let c = classify(Some(503), b"upstream timeout", Some("verify you are human"));
        assert_eq!(c, Classification::Transient);
        assert!(c.should_retry());
    }

    #[test]
    fn too_many_requests_is_transient() {
        assert_eq!(classify(Some(429), b"", None), Classification::Transient);
    }

    #[test]
    fn other_client_error_does_not_retry() {
        let c = classify(Some(401), b"", None);
        assert_eq!(c, Classification::ClientError);
        assert!(!c.should_retry());
    }

    #[test]
    fn network_failure_has_no_status() {
        assert_eq!(classify(None, b"", None), Classification::NetworkError);
    }
}
