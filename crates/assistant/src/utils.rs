//! Utilities shared by the assistants.

/// Returns the uppercase hex sha256 digest of `bytes`.
pub fn sha256_digest(bytes: impl AsRef<[u8]>) -> String {
    let digest = ring::digest::digest(&ring::digest::SHA256, bytes.as_ref());
    data_encoding::HEXUPPER.encode(digest.as_ref())
}

/// Returns the stack name embedded in a CloudFormation stack ARN, eg
/// `arn:aws:cloudformation:us-west-2:123456789012:stack/my-stack/guid`.
///
/// Falls back to the whole input when it is not shaped like a stack ARN.
pub fn stack_name(stack_id: &str) -> &str {
    stack_id
        .split_once(":stack/")
        .and_then(|(_, rest)| rest.split('/').next())
        .filter(|name| !name.is_empty())
        .unwrap_or(stack_id)
}
