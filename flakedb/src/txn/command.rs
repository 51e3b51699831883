//! Signed commands and their statement graph.
//!
//! A command is canonical JSON bytes plus a recoverable signature over
//! them. The transaction payload is a list of statements; each statement
//! addresses a subject (an existing id or a tempid), chooses assert or
//! retract, and carries attribute/value pairs whose names resolve through
//! the schema cache.

use serde::Deserialize;

use crate::crypto;
use crate::error::LedgerError;

/// A command as submitted: canonical bytes and the signature over them.
#[derive(Clone, Debug)]
pub struct SignedCommand {
    pub cmd: String,
    pub sig: String,
}

impl SignedCommand {
    pub fn new(cmd: impl Into<String>, sig: impl Into<String>) -> Self {
        Self {
            cmd: cmd.into(),
            sig: sig.into(),
        }
    }

    /// Transaction id: SHA3-256 of the canonical command bytes.
    pub fn tx_id(&self) -> String {
        crypto::sha3_256(self.cmd.as_bytes()).to_hex()
    }
}

/// Parsed top-level command envelope.
#[derive(Debug, Deserialize)]
pub struct CommandEnvelope {
    #[serde(rename = "type")]
    pub kind: String,
    pub db: Option<String>,
    #[serde(default)]
    pub tx: Vec<serde_json::Value>,
    /// Declared auth id; must match the recovered signer when present.
    pub auth: Option<String>,
    #[serde(default)]
    pub nonce: u64,
    /// Expiration instant in epoch milliseconds.
    pub expire: Option<i64>,
}

pub fn parse_command(cmd: &str) -> Result<CommandEnvelope, LedgerError> {
    serde_json::from_str(cmd)
        .map_err(|e| LedgerError::InvalidTx(format!("malformed command JSON: {e}")))
}

/// How a statement addresses its subject.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubjectRef {
    /// An existing subject id.
    Existing(i64),
    /// A tempid: `"collection"` or `"collection$name"`. Every occurrence of
    /// the same tempid within one transaction resolves to one minted id.
    TempId(String),
}

impl SubjectRef {
    /// Collection name a tempid mints into.
    pub fn tempid_collection(&self) -> Option<&str> {
        match self {
            SubjectRef::TempId(t) => Some(t.split('$').next().unwrap_or(t)),
            SubjectRef::Existing(_) => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatementAction {
    Assert,
    Retract,
}

/// One statement of a transaction.
#[derive(Clone, Debug)]
pub struct Statement {
    pub subject: SubjectRef,
    pub action: StatementAction,
    /// Attribute name/value pairs, in statement order. Names are either
    /// fully qualified (`ns/local`) or local to the subject's collection.
    pub attrs: Vec<(String, serde_json::Value)>,
}

/// Parses the `tx` array of a command into statements.
pub fn parse_statements(tx: &[serde_json::Value]) -> Result<Vec<Statement>, LedgerError> {
    if tx.is_empty() {
        return Err(LedgerError::InvalidTx("empty transaction".to_string()));
    }

    let mut statements = Vec::with_capacity(tx.len());
    for item in tx {
        let obj = item
            .as_object()
            .ok_or_else(|| LedgerError::InvalidTx("statement must be an object".to_string()))?;

        let subject = match obj.get("_id") {
            Some(serde_json::Value::Number(n)) => {
                let sid = n.as_i64().ok_or_else(|| {
                    LedgerError::InvalidTx(format!("_id {n} is not a valid subject id"))
                })?;
                SubjectRef::Existing(sid)
            }
            Some(serde_json::Value::String(tempid)) if !tempid.is_empty() => {
                SubjectRef::TempId(tempid.clone())
            }
            _ => {
                return Err(LedgerError::InvalidTx(
                    "statement missing _id".to_string(),
                ));
            }
        };

        let action = match obj.get("_action").and_then(|v| v.as_str()) {
            None | Some("add") => StatementAction::Assert,
            Some("delete") => StatementAction::Retract,
            Some(other) => {
                return Err(LedgerError::InvalidTx(format!(
                    "unknown _action {other:?}"
                )));
            }
        };

        let attrs: Vec<(String, serde_json::Value)> = obj
            .iter()
            .filter(|(k, _)| k.as_str() != "_id" && k.as_str() != "_action")
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if attrs.is_empty() {
            return Err(LedgerError::InvalidTx(
                "statement has no attributes".to_string(),
            ));
        }

        statements.push(Statement {
            subject,
            action,
            attrs,
        });
    }
    Ok(statements)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn command_envelope_parses() {
        let cmd = r#"{"type":"tx","db":"net/db","tx":[{"_id":"person","name":"ada"}],"nonce":7}"#;
        let envelope = parse_command(cmd).expect("parse");
        assert_eq!(envelope.kind, "tx");
        assert_eq!(envelope.db.as_deref(), Some("net/db"));
        assert_eq!(envelope.nonce, 7);
        assert_eq!(envelope.tx.len(), 1);
    }

    #[test]
    fn malformed_json_is_invalid_tx() {
        let err = parse_command("{nope").unwrap_err();
        assert_eq!(err.kind(), "invalid-tx");
    }

    #[test]
    fn statements_parse_ids_actions_and_attrs() {
        let tx = vec![
            json!({"_id": "person$ada", "name": "ada"}),
            json!({"_id": 42, "_action": "delete", "person/name": "old"}),
        ];
        let statements = parse_statements(&tx).expect("parse");

        assert_eq!(
            statements[0].subject,
            SubjectRef::TempId("person$ada".to_string())
        );
        assert_eq!(statements[0].subject.tempid_collection(), Some("person"));
        assert_eq!(statements[0].action, StatementAction::Assert);

        assert_eq!(statements[1].subject, SubjectRef::Existing(42));
        assert_eq!(statements[1].action, StatementAction::Retract);
        assert_eq!(statements[1].attrs[0].0, "person/name");
    }

    #[test]
    fn empty_or_attributeless_statements_are_rejected() {
        assert!(parse_statements(&[]).is_err());
        assert!(parse_statements(&[json!({"_id": "person"})]).is_err());
        assert!(parse_statements(&[json!({"name": "ada"})]).is_err());
        assert!(parse_statements(&[json!({"_id": 1, "_action": "upsert", "x/y": 1})]).is_err());
    }
}
