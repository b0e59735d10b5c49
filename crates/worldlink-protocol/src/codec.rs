//! Conversion seam between domain records and their protobuf wire schemas.

use prost::Message as _;

use crate::error::Result;

/// A domain record with a protobuf wire representation.
///
/// `from_wire` owns all validation and defaulting; `to_wire` omits fields
/// equal to their documented default.
pub trait WireRecord: Sized {
    /// The protobuf schema carrying this record.
    type Wire: prost::Message + Default;

    /// Build the wire shape.
    fn to_wire(&self) -> Self::Wire;

    /// Validate a decoded wire shape.
    fn from_wire(wire: Self::Wire) -> Result<Self>;

    /// Encode as protobuf bytes.
    fn encode(&self) -> Vec<u8> {
        self.to_wire().encode_to_vec()
    }

    /// Decode protobuf bytes and validate them.
    fn decode(bytes: &[u8]) -> Result<Self> {
        Self::from_wire(Self::Wire::decode(bytes)?)
    }
}
