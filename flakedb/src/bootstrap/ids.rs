//! Stable numeric ids of the bootstrap program.
//!
//! Every system collection, predicate, and tag carries an explicit id so
//! that ids embedded in code are portable across ledger instances and
//! releases. Changing any value here is a breaking change to every existing
//! ledger; new entries must take fresh numbers.

/// System collection ids. `_predicate` is cid 0 (see
/// [`crate::types::PREDICATE_CID`]), so predicate subject ids equal their
/// counters.
pub const COLLECTION_CID: u32 = 1;
pub const SHARD_CID: u32 = 2;
pub const TAG_CID: u32 = 3;
pub const FN_CID: u32 = 4;
pub const USER_CID: u32 = 5;
pub const AUTH_CID: u32 = 6;
pub const ROLE_CID: u32 = 7;
pub const RULE_CID: u32 = 8;
pub const SETTING_CID: u32 = 9;
pub const TX_CID: u32 = 10;
pub const BLOCK_CID: u32 = 11;

// _predicate predicates
pub const PREDICATE_NAME: i64 = 10;
pub const PREDICATE_DOC: i64 = 11;
pub const PREDICATE_TYPE: i64 = 12;
pub const PREDICATE_UNIQUE: i64 = 13;
pub const PREDICATE_MULTI: i64 = 14;
pub const PREDICATE_INDEX: i64 = 15;
pub const PREDICATE_UPSERT: i64 = 16;
pub const PREDICATE_COMPONENT: i64 = 17;
pub const PREDICATE_NO_HISTORY: i64 = 18;
pub const PREDICATE_RESTRICT_COLLECTION: i64 = 19;
pub const PREDICATE_SPEC: i64 = 20;
pub const PREDICATE_SPEC_DOC: i64 = 21;
pub const PREDICATE_TX_SPEC: i64 = 22;
pub const PREDICATE_TX_SPEC_DOC: i64 = 23;
pub const PREDICATE_RESTRICT_TAG: i64 = 24;
pub const PREDICATE_FULL_TEXT: i64 = 25;
pub const PREDICATE_ENCRYPTED: i64 = 26;
pub const PREDICATE_DEPRECATED: i64 = 27;

// _collection predicates
pub const COLLECTION_NAME: i64 = 40;
pub const COLLECTION_DOC: i64 = 41;
pub const COLLECTION_VERSION: i64 = 42;
pub const COLLECTION_SPEC: i64 = 43;
pub const COLLECTION_SPEC_DOC: i64 = 44;
pub const COLLECTION_SHARD: i64 = 45;

// _tag predicates
pub const TAG_ID: i64 = 50;
pub const TAG_DOC: i64 = 51;

// _fn predicates
pub const FN_NAME: i64 = 55;
pub const FN_PARAMS: i64 = 56;
pub const FN_CODE: i64 = 57;
pub const FN_DOC: i64 = 58;

// _auth predicates
pub const AUTH_ID: i64 = 60;
pub const AUTH_DOC: i64 = 61;
pub const AUTH_ROLES: i64 = 62;

// _role predicates
pub const ROLE_ID: i64 = 65;
pub const ROLE_DOC: i64 = 66;
pub const ROLE_RULES: i64 = 67;

// _rule predicates
pub const RULE_ID: i64 = 70;
pub const RULE_DOC: i64 = 71;
pub const RULE_COLLECTION: i64 = 72;
pub const RULE_PREDICATES: i64 = 73;
pub const RULE_FNS: i64 = 74;
pub const RULE_OPS: i64 = 75;
pub const RULE_COLLECTION_DEFAULT: i64 = 76;

// _setting predicates
pub const SETTING_ID: i64 = 80;
pub const SETTING_DOC: i64 = 81;
pub const SETTING_ANONYMOUS: i64 = 82;
pub const SETTING_LEDGERS: i64 = 83;
pub const SETTING_CONSENSUS: i64 = 84;

// _shard predicates
pub const SHARD_NAME: i64 = 86;
pub const SHARD_MINERS: i64 = 87;
pub const SHARD_MUTABLE: i64 = 88;

// _user predicates
pub const USER_USERNAME: i64 = 90;
pub const USER_ROLES: i64 = 91;
pub const USER_AUTH: i64 = 92;

// _tx predicates
pub const TX_ID: i64 = 95;
pub const TX_AUTH: i64 = 96;
pub const TX_AUTHORITY: i64 = 97;
pub const TX_NONCE: i64 = 98;
pub const TX_ERROR: i64 = 99;

// _block predicates
pub const BLOCK_NUMBER: i64 = 100;
pub const BLOCK_HASH: i64 = 101;
pub const BLOCK_PREV_HASH: i64 = 102;
pub const BLOCK_TRANSACTIONS: i64 = 103;
pub const BLOCK_LEDGERS: i64 = 104;
pub const BLOCK_INSTANT: i64 = 105;
pub const BLOCK_SIGS: i64 = 106;

/// Largest predicate id issued by the bootstrap program.
pub const MAX_BOOTSTRAP_PID: i64 = BLOCK_SIGS;
/// Largest collection id issued by the bootstrap program.
pub const MAX_BOOTSTRAP_CID: u32 = BLOCK_CID;
