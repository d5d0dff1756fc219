use jsonwebtoken::Header;
use serde_json::Value;

/// A validated token: the protected header and the decoded claims.
#[derive(Debug, Clone)]
pub struct Token {
    header: Header,
    claims: Value,
}

impl Token {
    pub(crate) fn new(header: Header, claims: Value) -> Self {
        Self { header, claims }
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn claims(&self) -> &Value {
        &self.claims
    }

    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.claims.get(name)
    }

    pub fn issuer(&self) -> Option<&str> {
        self.claim("iss")?.as_str()
    }

    pub fn subject(&self) -> Option<&str> {
        self.claim("sub")?.as_str()
    }

    /// Expiration as seconds since the epoch. Numeric-date claims may be
    /// fractional; those truncate.
    pub fn expiration(&self) -> Option<i64> {
        let exp = self.claim("exp")?;
        exp.as_i64().or_else(|| exp.as_f64().map(|exp| exp as i64))
    }

    /// The `aud` claim, normalized: a bare string becomes a one-element
    /// sequence, anything else an empty one.
    pub fn audiences(&self) -> Vec<String> {
        match self.claim("aud") {
            Some(Value::String(audience)) => vec![audience.clone()],
            Some(Value::Array(audiences)) => audiences
                .iter()
                .filter_map(|audience| audience.as_str().map(|audience| audience.to_string()))
                .collect(),
            _ => Vec::new(),
        }
    }
}
