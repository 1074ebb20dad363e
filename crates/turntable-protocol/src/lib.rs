//! Messages exchanged between the browser tool and the render server.

use serde::{Deserialize, Serialize};
use turntable_core::{CenteringTransform, UserOffset};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMsg {
    Hello {
        client_version: String,
    },
    /// Viewport nudge, as a fraction of the frame.
    SetUserOffset {
        dx: f32,
        dy: f32,
    },
    SetBrightness {
        value: f32,
    },
    SelectMaterial {
        id: String,
    },
    Generate {
        product: String,
        ring_type: String,
    },
    Cancel {
        job_id: u64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMsg {
    HelloAck {
        frame_count: u32,
    },
    Log {
        text: String,
    },
    /// Current controls, sent after every accepted change.
    Controls {
        user_offset: UserOffset,
        brightness: f32,
        material: String,
    },
    JobAccepted {
        job_id: u64,
        sequence: String,
        frame_count: u32,
    },
    /// The job never started; `reason` names the offending input.
    JobRejected {
        reason: String,
    },
    FrameRendered {
        job_id: u64,
        index: u32,
        total: u32,
    },
    JobComplete {
        job_id: u64,
        sequence: String,
        /// Download path of the archive, relative to the server root.
        archive_url: String,
        image_count: u32,
    },
    JobFailed {
        job_id: u64,
        reason: String,
        internal: bool,
    },
    JobCancelled {
        job_id: u64,
    },
}

/// Response body of `POST /api/model`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSummary {
    pub name: String,
    pub triangles: usize,
    pub bounds_min: [f32; 3],
    pub bounds_max: [f32; 3],
    pub centering: CenteringTransform,
}

/// JSON body of every HTTP error response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_msg_roundtrip() {
        let msg = ClientMsg::Generate {
            product: "doji_diamond".into(),
            ring_type: "ring".into(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        let back: ClientMsg = serde_json::from_str(&json).unwrap();
        assert_eq!(msg, back);
    }

    #[test]
    fn messages_are_tagged_by_type() {
        let json = serde_json::to_value(ClientMsg::SetUserOffset { dx: 0.25, dy: -0.5 }).unwrap();
        assert_eq!(json["type"], "SetUserOffset");
        assert_eq!(json["dx"], 0.25);

        let parsed: ClientMsg =
            serde_json::from_str(r#"{"type":"SelectMaterial","id":"18k-rose-gold"}"#).unwrap();
        assert_eq!(
            parsed,
            ClientMsg::SelectMaterial {
                id: "18k-rose-gold".into()
            }
        );
        assert!(serde_json::from_str::<ClientMsg>(r#"{"type":"Explode"}"#).is_err());
    }

    #[test]
    fn server_msg_roundtrip() {
        let msg = ServerMsg::JobComplete {
            job_id: 42,
            sequence: "doji_diamond_ring-rose-gold-sequence".into(),
            archive_url: "/api/archives/doji_diamond_ring-rose-gold-sequence.tar".into(),
            image_count: 36,
        };
        let json = serde_json::to_string(&msg).unwrap();
        let back: ServerMsg = serde_json::from_str(&json).unwrap();
        assert_eq!(msg, back);

        let controls = ServerMsg::Controls {
            user_offset: UserOffset::new(0.1, 0.0),
            brightness: 1.5,
            material: "platinum".into(),
        };
        let value = serde_json::to_value(&controls).unwrap();
        assert_eq!(value["user_offset"]["dx"], 0.1f32 as f64);
    }
}
