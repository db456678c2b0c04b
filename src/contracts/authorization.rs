//! Off-chain authorization message for `authorized_transfer`
//!
//! The token owner signs this message; a relayer later submits the
//! signature through the contract's authorized transfer entrypoint.

use num_bigint::BigInt;

use crate::micheline::Node;
use crate::types::Address;

/// `pack(timestamp) ‖ pack(recipient as 22 bytes) ‖ pack(token_id)`
pub fn authorized_transfer_message(
    timestamp: &BigInt,
    recipient: &Address,
    token_id: &BigInt,
) -> Vec<u8> {
    let mut message = Node::Int(timestamp.clone()).pack();
    message.extend(Node::bytes(recipient.to_bytes22().to_vec()).pack());
    message.extend(Node::Int(token_id.clone()).pack());
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::{parse_address, parse_token_id};

    #[test]
    fn test_message_layout() {
        let recipient = parse_address("tz1KqTpEZ7Yob7QbPE4Hy4Wo8fHG8LhKxZSx").unwrap();
        let token_id = parse_token_id("42").unwrap();
        let message =
            authorized_transfer_message(&BigInt::from(1_700_000_000i64), &recipient, &token_id);

        let mut expected = hex::decode("050080c49fd50c").unwrap();
        expected.extend(hex::decode("050a00000016").unwrap());
        expected.extend(recipient.to_bytes22());
        expected.extend(hex::decode("05002a").unwrap());
        assert_eq!(message, expected);
        assert_eq!(message.len(), 7 + 6 + 22 + 3);
    }

    #[test]
    fn test_message_is_reproducible() {
        let recipient = parse_address("tz1KqTpEZ7Yob7QbPE4Hy4Wo8fHG8LhKxZSx").unwrap();
        let ts = BigInt::from(1_700_000_000i64);
        let token_id = BigInt::from(42);
        assert_eq!(
            authorized_transfer_message(&ts, &recipient, &token_id),
            authorized_transfer_message(&ts, &recipient, &token_id)
        );
    }
}
