//! Key policy documents arrive either as JSON objects or as JSON text.
//! Both forms are normalized to a `serde_json::Value` before comparison so
//! key order and whitespace never register as a change.

use serde_json::{Value, json};

/// Parse string-encoded documents; leave structured ones as they are.
/// Text that is not valid JSON is kept verbatim as a string value.
pub fn normalize(policy: &Value) -> Value {
    match policy {
        Value::String(text) => serde_json::from_str(text).unwrap_or_else(|_| policy.clone()),
        other => other.clone(),
    }
}

/// True when the two documents differ after normalization.
pub fn differs(previous: Option<&Value>, desired: Option<&Value>) -> bool {
    previous.map(normalize) != desired.map(normalize)
}

/// Render a policy for the wire.
pub fn to_document(policy: &Value) -> String {
    match policy {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// The policy the remote service attaches to a key created without one:
/// the account root principal gets full access.
pub fn default_key_policy(partition: &str, account_id: &str) -> Value {
    json!({
        "Version": "2012-10-17",
        "Id": "key-default",
        "Statement": [
            {
                "Sid": "Enable IAM User Permissions",
                "Effect": "Allow",
                "Principal": { "AWS": format!("arn:{partition}:iam::{account_id}:root") },
                "Action": "kms:*",
                "Resource": "*"
            }
        ]
    })
}
