// Wire envelope constants.
//
// Every frame opens with a one-byte encoding tag. Binary frames use a
// reserved tag value; text frames are JSON objects and therefore always
// open with `{`.

/// Leading tag byte of every binary-encoded frame.
pub const WIRE_TAG_BINARY: u8 = 0xB1;

/// Leading byte of every text-encoded frame (text frames are JSON objects).
pub const WIRE_TAG_TEXT: u8 = b'{';

/// Message kind discriminant for an outbound call.
pub const WIRE_KIND_REQUEST: u8 = 0x01;

/// Message kind discriminant for a correlated response.
pub const WIRE_KIND_RESPONSE: u8 = 0x02;

/// Message kind discriminant for a server-initiated notification.
pub const WIRE_KIND_NOTIFICATION: u8 = 0x03;

/// Byte offset of the 1-byte message kind field.
pub const WIRE_KIND_OFFSET: usize = 1;

/// Byte offset where the 8-byte request id (u64) begins.
///
/// This is the unique request/response correlation id. Notifications carry
/// no correlation id; the field is written as zero and ignored on decode.
pub const WIRE_ID_OFFSET: usize = 2;

/// Total size of the fixed envelope header: tag + kind + request id.
pub const WIRE_HEADER_SIZE: usize = WIRE_ID_OFFSET + 8;

/// Size in bytes of a method-name length prefix (u16).
pub const WIRE_METHOD_LEN_SIZE: usize = 2;

/// Size in bytes of a payload length prefix (u32).
pub const WIRE_PAYLOAD_LEN_SIZE: usize = 4;

/// Response status byte: the response carries a result payload.
pub const RESPONSE_STATUS_OK: u8 = 0x00;

/// Response status byte: the response carries an error descriptor.
pub const RESPONSE_STATUS_ERROR: u8 = 0x01;
