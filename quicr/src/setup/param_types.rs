/// Setup and request parameter keys.
///
/// Even keys carry varint values, odd keys byte strings; see
/// [crate::coding::KeyValuePairs].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u64)]
pub enum ParameterType {
    Path = 0x1,
    MaxRequestId = 0x2,
    AuthorizationToken = 0x3,
    DeliveryTimeout = 0x4,
    EndpointId = 0x5,
}

impl From<ParameterType> for u64 {
    fn from(value: ParameterType) -> Self {
        value as u64
    }
}
