use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{error, warn};

use super::api::{BallotError, BallotResult, BytesVec};

const BALLOT_SERIALIZATION_VERSION: u16 = 0;

/// Versioned encoding used for every object sent over a channel.
pub fn encode<T: Serialize>(payload: &T) -> BallotResult<BytesVec> {
    serialize(&BytesVecVersioned {
        version: BALLOT_SERIALIZATION_VERSION,
        payload: serialize(payload)?,
    })
}

/// Canonical encoding: the bytes covered by Schnorr signatures.
pub fn serialize<T: ?Sized>(value: &T) -> BallotResult<BytesVec>
where
    T: serde::Serialize,
{
    match bincode::serialize(value) {
        Ok(bytes) => Ok(bytes),
        Err(err) => {
            error!("serialization failure: {}", err.to_string());
            Err(BallotError::Serialization(err.to_string()))
        }
    }
}

/// deserialization failures are reported to the peer, never fatal to the node
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> BallotResult<T> {
    let bytes_versioned: BytesVecVersioned = bincode::deserialize(bytes).map_err(|err| {
        warn!("outer deserialization failure: {}", err.to_string());
        BallotError::Serialization(err.to_string())
    })?;
    if bytes_versioned.version != BALLOT_SERIALIZATION_VERSION {
        warn!(
            "encoding version {}, expected {}",
            bytes_versioned.version, BALLOT_SERIALIZATION_VERSION
        );
        return Err(BallotError::Serialization(format!(
            "unsupported encoding version {}",
            bytes_versioned.version
        )));
    }
    bincode::deserialize(&bytes_versioned.payload).map_err(|err| {
        warn!("inner deserialization failure: {}", err.to_string());
        BallotError::Serialization(err.to_string())
    })
}

#[derive(Serialize, Deserialize)]
struct BytesVecVersioned {
    version: u16,
    payload: BytesVec,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_mismatch_is_rejected() {
        let bytes = serialize(&BytesVecVersioned {
            version: BALLOT_SERIALIZATION_VERSION + 1,
            payload: serialize(&7u32).unwrap(),
        })
        .unwrap();
        assert!(matches!(
            decode::<u32>(&bytes),
            Err(BallotError::Serialization(_))
        ));

        let good = encode(&7u32).unwrap();
        assert_eq!(decode::<u32>(&good).unwrap(), 7);
        assert!(decode::<u32>(&good[..3]).is_err());
    }
}
