//! Structural containment of required claims.
use crate::errors::ClaimsError;
use serde_json::{Map, Value};

/// Checks every required claim against the token claims.
///
/// Containment is one-directional: the token may carry arbitrarily more than
/// required. Scalars compare by value, sequences require a matching element
/// per required element (duplicates need a single witness), mappings recurse
/// per key, and a type mismatch at any level fails.
pub fn validate_required_claims(
    required: &Map<String, Value>,
    claims: &Value,
) -> Result<(), ClaimsError> {
    for (claim, required_value) in required {
        let observed = claims
            .get(claim)
            .ok_or_else(|| ClaimsError::MissingClaim(claim.clone()))?;
        value_contains(required_value, observed).map_err(|detail| ClaimsError::NotValid {
            claim: claim.clone(),
            detail,
        })?;
    }
    Ok(())
}

fn value_contains(required: &Value, observed: &Value) -> Result<(), String> {
    match (required, observed) {
        (Value::Object(required_map), Value::Object(observed_map)) => {
            for (key, required_value) in required_map {
                let observed_value = observed_map
                    .get(key)
                    .ok_or_else(|| format!("missing key {key:?}"))?;
                value_contains(required_value, observed_value)?;
            }
            Ok(())
        }
        (Value::Object(_), _) => Err(format!(
            "expected a mapping, received {}",
            value_kind(observed)
        )),
        (Value::Array(required_items), Value::Array(observed_items)) => {
            for required_item in required_items {
                let witnessed = observed_items
                    .iter()
                    .any(|observed_item| value_contains(required_item, observed_item).is_ok());
                if !witnessed {
                    return Err(format!("no element matching {required_item}"));
                }
            }
            Ok(())
        }
        (Value::Array(_), _) => Err(format!(
            "expected a sequence, received {}",
            value_kind(observed)
        )),
        _ => {
            if required == observed {
                Ok(())
            } else {
                Err(format!("expected {required}, received {observed}"))
            }
        }
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn required(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("required claims must be a mapping, got {other}"),
        }
    }

    #[test]
    fn scalars_match_by_value() {
        let claims = json!({"azp": "client", "level": 1337, "admin": true});
        validate_required_claims(&required(json!({"azp": "client"})), &claims).expect("string");
        validate_required_claims(&required(json!({"level": 1337})), &claims).expect("number");
        validate_required_claims(&required(json!({"admin": true})), &claims).expect("boolean");

        let err = validate_required_claims(&required(json!({"azp": "other"})), &claims)
            .expect_err("wrong value");
        assert!(matches!(err, ClaimsError::NotValid { ref claim, .. } if claim == "azp"));
    }

    #[test]
    fn missing_claim_names_the_key() {
        let err = validate_required_claims(&required(json!({"azp": "client"})), &json!({}))
            .expect_err("missing");
        assert!(matches!(err, ClaimsError::MissingClaim(ref claim) if claim == "azp"));
    }

    #[test]
    fn sequences_use_containment() {
        let claims = json!({"groups": ["foo", "bar", "baz"]});
        validate_required_claims(&required(json!({"groups": ["bar"]})), &claims).expect("subset");
        validate_required_claims(&required(json!({"groups": ["bar", "foo"]})), &claims)
            .expect("order free");
        // A duplicate requirement needs only one witness.
        validate_required_claims(&required(json!({"groups": ["bar", "bar"]})), &claims)
            .expect("duplicate");

        let err = validate_required_claims(&required(json!({"groups": ["qux"]})), &claims)
            .expect_err("absent element");
        assert!(matches!(err, ClaimsError::NotValid { ref claim, .. } if claim == "groups"));
    }

    #[test]
    fn mappings_recurse_and_allow_extras() {
        let claims = json!({
            "ctx": {"tenant": "a", "region": "eu", "labels": {"team": "infra", "tier": "prod"}}
        });
        validate_required_claims(
            &required(json!({"ctx": {"tenant": "a", "labels": {"team": "infra"}}})),
            &claims,
        )
        .expect("nested subset");

        let err = validate_required_claims(
            &required(json!({"ctx": {"labels": {"team": "web"}}})),
            &claims,
        )
        .expect_err("nested mismatch");
        assert!(matches!(err, ClaimsError::NotValid { ref claim, .. } if claim == "ctx"));
    }

    #[test]
    fn sequences_of_mappings_match_elementwise() {
        let claims = json!({"entitlements": [{"bar": "baz"}, {"oof": "rab"}]});
        validate_required_claims(
            &required(json!({"entitlements": [{"bar": "baz"}]})),
            &claims,
        )
        .expect("mapping element");

        validate_required_claims(
            &required(json!({"entitlements": [{"bar": "qux"}]})),
            &claims,
        )
        .expect_err("no matching mapping element");
    }

    #[test]
    fn type_mismatch_fails() {
        let claims = json!({"groups": "not-a-sequence", "azp": ["not-a-scalar"]});
        validate_required_claims(&required(json!({"groups": ["bar"]})), &claims)
            .expect_err("sequence required");
        validate_required_claims(&required(json!({"azp": "client"})), &claims)
            .expect_err("scalar required");
    }

    #[test]
    fn containment_is_reflexive() {
        let document = json!({
            "azp": "client",
            "level": 3,
            "groups": ["a", "b"],
            "ctx": {"nested": {"deep": [1, 2, {"k": "v"}]}},
        });
        validate_required_claims(&required(document.clone()), &document).expect("reflexive");
    }
}
