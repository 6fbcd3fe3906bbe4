use std::str::FromStr;

use crate::Error;

/// An m-of-n signature specification for customized DID documents: any m
/// controller signatures out of the n controllers qualify the document.
/// Textual form `"m:n"`.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct MultiSignature {
    m: usize,
    n: usize,
}

impl MultiSignature {
    pub fn new(m: usize, n: usize) -> Result<Self, Error> {
        if n == 0 {
            return Err(Error::IllegalArgument(
                "invalid multisig spec: n should be > 0".into(),
            ));
        }
        if m == 0 || m > n {
            return Err(Error::IllegalArgument(
                "invalid multisig spec: m should be > 0 and <= n".into(),
            ));
        }
        Ok(Self { m, n })
    }
    pub fn m(&self) -> usize {
        self.m
    }
    pub fn n(&self) -> usize {
        self.n
    }
}

impl std::fmt::Display for MultiSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}:{}", self.m, self.n)
    }
}

impl FromStr for MultiSignature {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (m, n) = s
            .split_once(':')
            .ok_or(Error::IllegalArgument("invalid multisig spec".into()))?;
        let m = m
            .parse::<usize>()
            .map_err(|_| Error::IllegalArgument("invalid multisig spec".into()))?;
        let n = n
            .parse::<usize>()
            .map_err(|_| Error::IllegalArgument("invalid multisig spec".into()))?;
        Self::new(m, n)
    }
}

impl serde::Serialize for MultiSignature {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for MultiSignature {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(serde::de::Error::custom)
    }
}
