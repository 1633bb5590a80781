use bytes::{Bytes, BytesMut};

/// A completed elementary-stream unit as delivered by the demuxer.
#[derive(Debug, Clone, PartialEq)]
pub struct PesUnit {
    /// Presentation time in seconds.
    pub pts: f64,
    /// Payload fragments, to be concatenated in order.
    pub fragments: Vec<Bytes>,
}

impl PesUnit {
    pub fn new(pts: f64, fragments: Vec<Bytes>) -> Self {
        Self { pts, fragments }
    }

    /// Total payload size in bytes.
    pub fn len(&self) -> usize {
        self.fragments.iter().map(Bytes::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The concatenated payload.
    pub fn payload(&self) -> Bytes {
        match self.fragments.as_slice() {
            [single] => single.clone(),
            fragments => {
                let mut buf = BytesMut::with_capacity(self.len());
                for fragment in fragments {
                    buf.extend_from_slice(fragment);
                }
                buf.freeze()
            }
        }
    }
}
