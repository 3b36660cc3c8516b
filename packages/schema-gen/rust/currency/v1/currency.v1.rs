// @generated
// This file is @generated by prost-build.
/// A currency pair to look up or subscribe to.
#[derive(Clone, Copy, PartialEq, Eq, Hash, ::prost::Message)]
pub struct RateRequest {
    /// Base currency for the rate.
    #[prost(enumeration = "Currencies", tag = "1")]
    pub base: i32,
    /// Destination currency for the rate.
    #[prost(enumeration = "Currencies", tag = "2")]
    pub destination: i32,
}
/// Exchange rate between two currencies.
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct RateResponse {
    #[prost(enumeration = "Currencies", tag = "1")]
    pub base: i32,
    #[prost(enumeration = "Currencies", tag = "2")]
    pub destination: i32,
    /// Units of destination currency per unit of base currency.
    #[prost(double, tag = "3")]
    pub rate: f64,
}
/// A message pushed on a rate subscription stream.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StreamingRateResponse {
    #[prost(oneof = "streaming_rate_response::Message", tags = "1, 2")]
    pub message: ::core::option::Option<streaming_rate_response::Message>,
}
/// Nested message and enum types in `StreamingRateResponse`.
pub mod streaming_rate_response {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Message {
        #[prost(message, tag = "1")]
        RateResponse(super::RateResponse),
        #[prost(message, tag = "2")]
        Error(super::SubscriptionError),
    }
}
/// In-band error for a rejected subscription request.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SubscriptionError {
    /// google.rpc.Code value (ALREADY_EXISTS, INVALID_ARGUMENT).
    #[prost(int32, tag = "1")]
    pub code: i32,
    /// Human readable description.
    #[prost(string, tag = "2")]
    pub message: ::prost::alloc::string::String,
    /// The request that was rejected, echoed as received.
    #[prost(message, optional, tag = "3")]
    pub request: ::core::option::Option<RateRequest>,
}
/// Supported currencies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum Currencies {
    Eur = 0,
    Usd = 1,
    Jpy = 2,
    Bgn = 3,
    Czk = 4,
    Dkk = 5,
    Gbp = 6,
    Huf = 7,
    Pln = 8,
    Ron = 9,
    Sek = 10,
    Chf = 11,
    Isk = 12,
    Nok = 13,
    Hrk = 14,
    Rub = 15,
    Try = 16,
    Aud = 17,
    Brl = 18,
    Cad = 19,
    Cny = 20,
    Hkd = 21,
    Idr = 22,
    Ils = 23,
    Inr = 24,
    Krw = 25,
    Mxn = 26,
    Myr = 27,
    Nzd = 28,
    Php = 29,
    Sgd = 30,
    Thb = 31,
    Zar = 32,
}
impl Currencies {
    /// String value of the enum field names used in the ProtoBuf definition.
    ///
    /// The values are not transformed in any way and thus are considered stable
    /// (if the ProtoBuf definition does not change) and safe for programmatic use.
    pub fn as_str_name(&self) -> &'static str {
        match self {
            Self::Eur => "EUR",
            Self::Usd => "USD",
            Self::Jpy => "JPY",
            Self::Bgn => "BGN",
            Self::Czk => "CZK",
            Self::Dkk => "DKK",
            Self::Gbp => "GBP",
            Self::Huf => "HUF",
            Self::Pln => "PLN",
            Self::Ron => "RON",
            Self::Sek => "SEK",
            Self::Chf => "CHF",
            Self::Isk => "ISK",
            Self::Nok => "NOK",
            Self::Hrk => "HRK",
            Self::Rub => "RUB",
            Self::Try => "TRY",
            Self::Aud => "AUD",
            Self::Brl => "BRL",
            Self::Cad => "CAD",
            Self::Cny => "CNY",
            Self::Hkd => "HKD",
            Self::Idr => "IDR",
            Self::Ils => "ILS",
            Self::Inr => "INR",
            Self::Krw => "KRW",
            Self::Mxn => "MXN",
            Self::Myr => "MYR",
            Self::Nzd => "NZD",
            Self::Php => "PHP",
            Self::Sgd => "SGD",
            Self::Thb => "THB",
            Self::Zar => "ZAR",
        }
    }
    /// Creates an enum from field names used in the ProtoBuf definition.
    pub fn from_str_name(value: &str) -> ::core::option::Option<Self> {
        match value {
            "EUR" => Some(Self::Eur),
            "USD" => Some(Self::Usd),
            "JPY" => Some(Self::Jpy),
            "BGN" => Some(Self::Bgn),
            "CZK" => Some(Self::Czk),
            "DKK" => Some(Self::Dkk),
            "GBP" => Some(Self::Gbp),
            "HUF" => Some(Self::Huf),
            "PLN" => Some(Self::Pln),
            "RON" => Some(Self::Ron),
            "SEK" => Some(Self::Sek),
            "CHF" => Some(Self::Chf),
            "ISK" => Some(Self::Isk),
            "NOK" => Some(Self::Nok),
            "HRK" => Some(Self::Hrk),
            "RUB" => Some(Self::Rub),
            "TRY" => Some(Self::Try),
            "AUD" => Some(Self::Aud),
            "BRL" => Some(Self::Brl),
            "CAD" => Some(Self::Cad),
            "CNY" => Some(Self::Cny),
            "HKD" => Some(Self::Hkd),
            "IDR" => Some(Self::Idr),
            "ILS" => Some(Self::Ils),
            "INR" => Some(Self::Inr),
            "KRW" => Some(Self::Krw),
            "MXN" => Some(Self::Mxn),
            "MYR" => Some(Self::Myr),
            "NZD" => Some(Self::Nzd),
            "PHP" => Some(Self::Php),
            "SGD" => Some(Self::Sgd),
            "THB" => Some(Self::Thb),
            "ZAR" => Some(Self::Zar),
            _ => None,
        }
    }
}
include!("currency.v1.tonic.rs");
