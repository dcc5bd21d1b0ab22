use serde::{Deserialize, Deserializer, Serialize, Serializer, de, ser::SerializeStruct};

/// Outcome code carried in every response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum Code {
    Success,
    NoData,
    WrongArguments,
}

impl Code {
    pub const fn as_u16(self) -> u16 {
        match self {
            Code::Success => 0,
            Code::NoData => 404,
            Code::WrongArguments => 522,
        }
    }

    pub const fn status(self) -> &'static str {
        match self {
            Code::Success => "success",
            Code::NoData => "no data",
            Code::WrongArguments => "wrong arguments",
        }
    }
}

impl From<Code> for u16 {
    fn from(code: Code) -> Self {
        code.as_u16()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown response code {0}")]
pub struct UnknownCode(pub u16);

impl TryFrom<u16> for Code {
    type Error = UnknownCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Code::Success),
            404 => Ok(Code::NoData),
            522 => Ok(Code::WrongArguments),
            other => Err(UnknownCode(other)),
        }
    }
}

/// The `{code, status, data}` wrapper around every response.
///
/// The status string is always derived from [`Code`], so an envelope can never
/// carry a code outside the known set or a status that disagrees with it.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope<T> {
    code: Code,
    data: T,
}

impl<T> Envelope<T> {
    pub fn new(code: Code, data: T) -> Self {
        Envelope { code, data }
    }

    pub fn success(data: T) -> Self {
        Self::new(Code::Success, data)
    }

    pub fn code(&self) -> Code {
        self.code
    }

    pub fn status(&self) -> &'static str {
        self.code.status()
    }

    pub fn data(&self) -> &T {
        &self.data
    }
}

impl<T: Serialize> Serialize for Envelope<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Envelope", 3)?;
        state.serialize_field("code", &self.code)?;
        state.serialize_field("status", self.code.status())?;
        state.serialize_field("data", &self.data)?;
        state.end()
    }
}

#[derive(Deserialize)]
struct RawEnvelope<T> {
    code: Code,
    status: String,
    data: T,
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Envelope<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let RawEnvelope { code, status, data } = RawEnvelope::deserialize(deserializer)?;
        if status != code.status() {
            return Err(de::Error::custom(format_args!(
                "status {status:?} does not match code {}",
                code.as_u16()
            )));
        }
        Ok(Envelope { code, data })
    }
}
