#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Metadata {
    /// Frequency (MHz).
    #[prost(float, tag="1")]
    pub frequency: f32,
    /// Data rate, e.g. "SF7BW125".
    #[prost(string, tag="2")]
    pub data_rate: std::string::String,
    /// Coding rate, e.g. "4/5".
    #[prost(string, tag="3")]
    pub coding_rate: std::string::String,
    /// PHYPayload size (bytes).
    #[prost(uint32, tag="4")]
    pub payload_size: u32,
    /// RSSI (dBm).
    #[prost(sint32, tag="5")]
    pub rssi: i32,
    /// LoRa SNR (dB).
    #[prost(float, tag="6")]
    pub lsnr: f32,
    /// Gateway internal counter (us).
    #[prost(uint32, tag="7")]
    pub timestamp: u32,
    /// Reception time.
    #[prost(message, optional, tag="8")]
    pub time: ::std::option::Option<::prost_types::Timestamp>,
    /// Gateway latitude, filled in by the router.
    #[prost(float, optional, tag="9")]
    pub latitude: ::std::option::Option<f32>,
    /// Gateway longitude, filled in by the router.
    #[prost(float, optional, tag="10")]
    pub longitude: ::std::option::Option<f32>,
    /// Gateway altitude (m), filled in by the router.
    #[prost(sint32, optional, tag="11")]
    pub altitude: ::std::option::Option<i32>,
    /// Duty-cycle window state of the RX1 subband.
    #[prost(uint32, tag="12")]
    pub duty_rx1: u32,
    /// Duty-cycle window state of the RX2 subband.
    #[prost(uint32, tag="13")]
    pub duty_rx2: u32,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StatsMetadata {
    /// Gateway latitude.
    #[prost(float, optional, tag="1")]
    pub latitude: ::std::option::Option<f32>,
    /// Gateway longitude.
    #[prost(float, optional, tag="2")]
    pub longitude: ::std::option::Option<f32>,
    /// Gateway altitude (m).
    #[prost(sint32, optional, tag="3")]
    pub altitude: ::std::option::Option<i32>,
    /// Number of packets received with a valid CRC.
    #[prost(uint32, tag="4")]
    pub rx_ok: u32,
    /// Number of packets emitted.
    #[prost(uint32, tag="5")]
    pub tx_ok: u32,
    /// Gateway time.
    #[prost(message, optional, tag="6")]
    pub time: ::std::option::Option<::prost_types::Timestamp>,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StatsReq {
    /// Gateway ID (EUI64).
    #[prost(bytes, tag="1")]
    pub gateway_id: std::vec::Vec<u8>,
    /// Gateway status report.
    #[prost(message, optional, tag="2")]
    pub metadata: ::std::option::Option<StatsMetadata>,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DataRouterReq {
    /// PHYPayload.
    #[prost(bytes, tag="1")]
    pub payload: std::vec::Vec<u8>,
    /// RX meta-data.
    #[prost(message, optional, tag="2")]
    pub metadata: ::std::option::Option<Metadata>,
    /// Gateway ID (EUI64).
    #[prost(bytes, tag="3")]
    pub gateway_id: std::vec::Vec<u8>,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DataRouterRes {
    /// PHYPayload to emit.
    #[prost(bytes, tag="1")]
    pub payload: std::vec::Vec<u8>,
    /// TX meta-data.
    #[prost(message, optional, tag="2")]
    pub metadata: ::std::option::Option<Metadata>,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DataBrokerReq {
    /// PHYPayload.
    #[prost(bytes, tag="1")]
    pub payload: std::vec::Vec<u8>,
    /// RX meta-data, enriched with gateway location and duty-cycle states.
    #[prost(message, optional, tag="2")]
    pub metadata: ::std::option::Option<Metadata>,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DataBrokerRes {
    /// PHYPayload to emit. Empty when no downlink is scheduled.
    #[prost(bytes, tag="1")]
    pub payload: std::vec::Vec<u8>,
    /// TX meta-data.
    #[prost(message, optional, tag="2")]
    pub metadata: ::std::option::Option<Metadata>,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RouterRequest {
    /// Correlation ID, echoed in the reply.
    #[prost(uint32, tag="1")]
    pub id: u32,
    #[prost(oneof="router_request::Kind", tags="2, 3")]
    pub kind: ::std::option::Option<router_request::Kind>,
}
pub mod router_request {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Kind {
        /// Uplink data.
        #[prost(message, tag="2")]
        Data(super::DataRouterReq),
        /// Gateway status report.
        #[prost(message, tag="3")]
        Stats(super::StatsReq),
    }
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RouterReply {
    /// Correlation ID of the request.
    #[prost(uint32, tag="1")]
    pub id: u32,
    #[prost(enumeration="Status", tag="2")]
    pub status: i32,
    /// Downlink to emit, if any.
    #[prost(message, optional, tag="3")]
    pub data: ::std::option::Option<DataRouterRes>,
    /// Failure reason (empty on success).
    #[prost(string, tag="4")]
    pub reason: std::string::String,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BrokerRequest {
    /// Correlation ID, echoed in the reply.
    #[prost(uint32, tag="1")]
    pub id: u32,
    #[prost(message, optional, tag="2")]
    pub data: ::std::option::Option<DataBrokerReq>,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BrokerReply {
    /// Correlation ID of the request.
    #[prost(uint32, tag="1")]
    pub id: u32,
    #[prost(enumeration="Status", tag="2")]
    pub status: i32,
    /// Downlink scheduled by the broker, if any.
    #[prost(message, optional, tag="3")]
    pub data: ::std::option::Option<DataBrokerRes>,
    /// Failure reason (empty on success).
    #[prost(string, tag="4")]
    pub reason: std::string::String,
}
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum Status {
    Ok = 0,
    /// Rejected request, do not retransmit.
    Structural = 1,
    /// Backend failure, may retransmit.
    Operational = 2,
    /// Nobody owns the device.
    NotFound = 3,
}
