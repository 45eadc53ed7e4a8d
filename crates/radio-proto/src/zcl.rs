//! ZCL (Zigbee Cluster Library) frame codec.
//!
//! This is the generic wire format shared by the normal dispatch pipeline
//! and the fast-path decoder: frame control byte, optional manufacturer
//! code, transaction sequence, command ID, then a command- or
//! cluster-specific payload (for `ReportAttributes`, a run of TLV
//! attribute records).

use crate::error::ProtocolError;

/// ZCL frame type (bits 0-1 of the frame control byte).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameType {
    Global = 0x00,
    ClusterSpecific = 0x01,
}

/// ZCL direction (bit 3 of the frame control byte).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Direction {
    ClientToServer = 0x00,
    ServerToClient = 0x01,
}

/// Manufacturer-specific bit (bit 2 of the frame control byte).
const FC_MANUFACTURER_SPECIFIC: u8 = 0x04;
const FC_DIRECTION: u8 = 0x08;
const FC_FRAME_TYPE_MASK: u8 = 0x03;

/// Global (foundation) commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum GlobalCommand {
    ReadAttributes = 0x00,
    ReadAttributesResponse = 0x01,
    WriteAttributes = 0x02,
    WriteAttributesUndivided = 0x03,
    WriteAttributesResponse = 0x04,
    WriteAttributesNoResponse = 0x05,
    ConfigureReporting = 0x06,
    ConfigureReportingResponse = 0x07,
    ReadReportingConfig = 0x08,
    ReadReportingConfigResponse = 0x09,
    ReportAttributes = 0x0A,
    DefaultResponse = 0x0B,
    DiscoverAttributes = 0x0C,
    DiscoverAttributesResponse = 0x0D,
}

/// ZCL data types (the subset the fast path and handlers need to size).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DataType {
    NoData = 0x00,
    Data8 = 0x08,
    Data16 = 0x09,
    Data24 = 0x0A,
    Data32 = 0x0B,
    Boolean = 0x10,
    Bitmap8 = 0x18,
    Bitmap16 = 0x19,
    Bitmap24 = 0x1A,
    Bitmap32 = 0x1B,
    Uint8 = 0x20,
    Uint16 = 0x21,
    Uint24 = 0x22,
    Uint32 = 0x23,
    Int8 = 0x28,
    Int16 = 0x29,
    Int24 = 0x2A,
    Int32 = 0x2B,
    Enum8 = 0x30,
    Enum16 = 0x31,
    Float16 = 0x38,
    Float32 = 0x39,
    Float64 = 0x3A,
    OctetString = 0x41,
    CharString = 0x42,
    Array = 0x48,
    Struct = 0x4C,
    Ieee = 0xF0,
}

/// Byte size of a fixed-width data type. Variable-length types
/// (`0x41`/`0x42`) are handled separately: the byte after the type code is
/// a length prefix. Unknown type IDs return `None` and parsing must abort.
#[must_use]
pub fn fixed_data_type_size(type_id: u8) -> Option<usize> {
    match type_id {
        0x00 => Some(0),
        0x08 | 0x10 | 0x18 | 0x20 | 0x28 | 0x30 => Some(1),
        0x09 | 0x19 | 0x21 | 0x29 | 0x31 | 0x38 => Some(2),
        0x0A | 0x1A | 0x22 | 0x2A => Some(3),
        0x0B | 0x1B | 0x23 | 0x2B | 0x39 => Some(4),
        0x3A => Some(8),
        0xF0 => Some(8),
        _ => None,
    }
}

/// A decoded attribute record from a `ReportAttributes`/
/// `ReadAttributesResponse` payload.
#[derive(Debug, Clone)]
pub struct AttributeRecord {
    pub attr_id: u16,
    pub data_type: u8,
    pub data: Vec<u8>,
}

/// Scan a `ReportAttributes`-shaped payload (`attr_id:2 LE, type:1,
/// value:N`) into attribute records. Stops (returning what it has so far)
/// at the first unknown type ID — an unrecognized type means the
/// remaining length can't be determined, so parsing aborts there.
#[must_use]
pub fn scan_attribute_records(payload: &[u8]) -> Vec<AttributeRecord> {
    let mut records = Vec::new();
    let mut idx = 0;
    while idx + 3 <= payload.len() {
        let attr_id = u16::from_le_bytes([payload[idx], payload[idx + 1]]);
        let data_type = payload[idx + 2];
        idx += 3;

        let size = if data_type == DataType::OctetString as u8 {
            if idx >= payload.len() {
                break;
            }
            let len = payload[idx] as usize;
            idx += 1;
            len
        } else if data_type == DataType::CharString as u8 {
            if idx >= payload.len() {
                break;
            }
            let len = payload[idx] as usize;
            idx += 1;
            len
        } else {
            match fixed_data_type_size(data_type) {
                Some(size) => size,
                None => break,
            }
        };

        if idx + size > payload.len() {
            break;
        }
        let data = payload[idx..idx + size].to_vec();
        idx += size;
        records.push(AttributeRecord {
            attr_id,
            data_type,
            data,
        });
    }
    records
}

/// A parsed or to-be-serialized ZCL frame.
#[derive(Debug, Clone)]
pub struct ZclFrame {
    frame_control: u8,
    pub manufacturer_code: Option<u16>,
    pub transaction_seq: u8,
    pub command_id: u8,
    pub payload: Vec<u8>,
}

impl ZclFrame {
    #[must_use]
    pub fn new(
        frame_type: FrameType,
        direction: Direction,
        manufacturer_code: Option<u16>,
        transaction_seq: u8,
        command_id: u8,
        payload: Vec<u8>,
    ) -> Self {
        let mut frame_control = frame_type as u8 & FC_FRAME_TYPE_MASK;
        if direction == Direction::ServerToClient {
            frame_control |= FC_DIRECTION;
        }
        if manufacturer_code.is_some() {
            frame_control |= FC_MANUFACTURER_SPECIFIC;
        }
        Self {
            frame_control,
            manufacturer_code,
            transaction_seq,
            command_id,
            payload,
        }
    }

    /// Parse a raw ZCL frame off the wire. Tolerates (and does not require)
    /// the manufacturer-specific bit; honors it when set.
    pub fn parse(bytes: &[u8]) -> Result<Self, ProtocolError> {
        if bytes.len() < 3 {
            return Err(ProtocolError::FrameTooShort(bytes.len()));
        }
        let frame_control = bytes[0];
        let mut idx = 1;

        let manufacturer_code = if frame_control & FC_MANUFACTURER_SPECIFIC != 0 {
            if bytes.len() < idx + 2 {
                return Err(ProtocolError::FrameTooShort(bytes.len()));
            }
            let code = u16::from_le_bytes([bytes[idx], bytes[idx + 1]]);
            idx += 2;
            Some(code)
        } else {
            None
        };

        if bytes.len() < idx + 2 {
            return Err(ProtocolError::FrameTooShort(bytes.len()));
        }
        let transaction_seq = bytes[idx];
        let command_id = bytes[idx + 1];
        idx += 2;

        Ok(Self {
            frame_control,
            manufacturer_code,
            transaction_seq,
            command_id,
            payload: bytes[idx..].to_vec(),
        })
    }

    #[must_use]
    pub fn frame_type(&self) -> FrameType {
        if self.frame_control & FC_FRAME_TYPE_MASK == FrameType::ClusterSpecific as u8 {
            FrameType::ClusterSpecific
        } else {
            FrameType::Global
        }
    }

    #[must_use]
    pub fn is_cluster_specific(&self) -> bool {
        self.frame_type() == FrameType::ClusterSpecific
    }

    #[must_use]
    pub fn is_from_server(&self) -> bool {
        self.frame_control & FC_DIRECTION != 0
    }

    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + self.payload.len());
        out.push(self.frame_control);
        if let Some(code) = self.manufacturer_code {
            out.extend_from_slice(&code.to_le_bytes());
        }
        out.push(self.transaction_seq);
        out.push(self.command_id);
        out.extend_from_slice(&self.payload);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn occupancy_report_attribute_record_decodes() {
        // attr 0x0000, bitmap8, value 0x01
        let payload = [0x00, 0x00, 0x18, 0x01];
        let records = scan_attribute_records(&payload);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].attr_id, 0x0000);
        assert_eq!(records[0].data_type, DataType::Bitmap8 as u8);
        assert_eq!(records[0].data, vec![0x01]);
    }

    #[test]
    fn unknown_type_aborts_remaining_scan() {
        let payload = [0x00, 0x00, 0xFF, 0x01, 0x02, 0x03];
        let records = scan_attribute_records(&payload);
        assert!(records.is_empty());
    }

    #[test]
    fn roundtrip_without_manufacturer_code() {
        let frame = ZclFrame::new(
            FrameType::Global,
            Direction::ServerToClient,
            None,
            7,
            GlobalCommand::ReportAttributes as u8,
            vec![0x00, 0x00, 0x10, 0x01],
        );
        let bytes = frame.serialize();
        let parsed = ZclFrame::parse(&bytes).unwrap();
        assert_eq!(parsed.transaction_seq, 7);
        assert_eq!(parsed.command_id, GlobalCommand::ReportAttributes as u8);
        assert!(parsed.is_from_server());
        assert_eq!(parsed.payload, vec![0x00, 0x00, 0x10, 0x01]);
    }
}
