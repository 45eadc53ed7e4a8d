//! Touchlink (ZLL commissioning) wire format for ZNP-family coordinators.
//!
//! Touchlink is optional; when a ZNP backend is in use, InterPAN control
//! must be emitted as raw Z-Stack frames on the serial transport, since
//! Touchlink runs outside normal PAN membership and the usual
//! `ControllerApplication` surface has no route for it.

/// Z-Stack frame start-of-frame marker.
pub const SOF: u8 = 0xFE;
/// SREQ|AF command group byte (`cmd0`).
pub const CMD0_SREQ_AF: u8 = 0x24;
/// InterPanCtl sub-command (`cmd1`).
pub const CMD1_INTER_PAN_CTL: u8 = 0x10;

/// `InterPanCtl` sub-commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum InterPanSubCommand {
    Clear = 0,
    SetChannel = 1,
    RegisterEndpoint = 2,
}

/// ZLL profile and cluster constants.
pub const ZLL_PROFILE_ID: u16 = 0xC05E;
pub const ZLL_CLUSTER_ID: u16 = 0x1000;
pub const ZLL_ENDPOINT: u8 = 12;

/// ZLL commissioning commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ZllCommand {
    ScanRequest = 0x00,
    Identify = 0x06,
    Reset = 0x07,
}

/// XOR frame-check-sequence over length + payload, Z-Stack's simple FCS.
fn xor_fcs(length: u8, payload: &[u8]) -> u8 {
    let mut fcs = CMD0_SREQ_AF ^ CMD1_INTER_PAN_CTL ^ length;
    for &b in payload {
        fcs ^= b;
    }
    fcs
}

/// Build a raw Z-Stack `InterPanCtl` frame: `SOF, length, cmd0, cmd1,
/// payload…, fcs`.
#[must_use]
pub fn build_inter_pan_ctl_frame(sub_cmd: InterPanSubCommand, data: &[u8]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(1 + data.len());
    payload.push(sub_cmd as u8);
    payload.extend_from_slice(data);

    let length = payload.len() as u8;
    let fcs = xor_fcs(length, &payload);

    let mut frame = Vec::with_capacity(5 + payload.len());
    frame.push(SOF);
    frame.push(length);
    frame.push(CMD0_SREQ_AF);
    frame.push(CMD1_INTER_PAN_CTL);
    frame.extend_from_slice(&payload);
    frame.push(fcs);
    frame
}

#[must_use]
pub fn clear_inter_pan() -> Vec<u8> {
    build_inter_pan_ctl_frame(InterPanSubCommand::Clear, &[])
}

#[must_use]
pub fn set_inter_pan_channel(channel: u8) -> Vec<u8> {
    build_inter_pan_ctl_frame(InterPanSubCommand::SetChannel, &[channel])
}

#[must_use]
pub fn register_inter_pan_endpoint(endpoint: u8) -> Vec<u8> {
    build_inter_pan_ctl_frame(InterPanSubCommand::RegisterEndpoint, &[endpoint])
}

/// Build a ZLL Scan Request command payload:
/// `trans_id:4, zb_info:1=0x04, tl_info:1=0x12`.
#[must_use]
pub fn scan_request_payload(trans_id: u32) -> Vec<u8> {
    let mut payload = trans_id.to_le_bytes().to_vec();
    payload.push(0x04); // zb_info
    payload.push(0x12); // tl_info
    payload
}

/// Build a ZLL Identify command payload: `trans_id:4, duration:2`.
#[must_use]
pub fn identify_payload(trans_id: u32, duration: u16) -> Vec<u8> {
    let mut payload = trans_id.to_le_bytes().to_vec();
    payload.extend_from_slice(&duration.to_le_bytes());
    payload
}

/// Build a ZLL Reset command payload: `trans_id:4`.
#[must_use]
pub fn reset_payload(trans_id: u32) -> Vec<u8> {
    trans_id.to_le_bytes().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_channel_frame_has_expected_shape() {
        let frame = set_inter_pan_channel(15);
        assert_eq!(frame[0], SOF);
        assert_eq!(frame[1], 2); // length: sub_cmd + channel
        assert_eq!(frame[2], CMD0_SREQ_AF);
        assert_eq!(frame[3], CMD1_INTER_PAN_CTL);
        assert_eq!(frame[4], InterPanSubCommand::SetChannel as u8);
        assert_eq!(frame[5], 15);
        // fcs is the final byte
        assert_eq!(frame.len(), 7);
    }

    #[test]
    fn scan_request_payload_has_zb_and_tl_info() {
        let payload = scan_request_payload(42);
        assert_eq!(payload.len(), 6);
        assert_eq!(payload[4], 0x04);
        assert_eq!(payload[5], 0x12);
    }

    #[test]
    fn fcs_changes_with_payload() {
        let a = build_inter_pan_ctl_frame(InterPanSubCommand::Clear, &[]);
        let b = build_inter_pan_ctl_frame(InterPanSubCommand::SetChannel, &[11]);
        assert_ne!(a.last(), b.last());
    }
}
