// Demo service wire types
// Messages for package `demo`; the DemoService client and server stubs are
// generated by build.rs and included below
//
// Numan Thabit 2025 Nov

#[derive(Clone, PartialEq, prost::Message)]
pub struct HelloRequest {
    #[prost(string, tag = "1")]
    pub name: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct HelloResponse {
    #[prost(string, tag = "1")]
    pub message: String,
}

include!(concat!(env!("OUT_DIR"), "/demo.DemoService.rs"));

pub use demo_service_client::DemoServiceClient;
pub use demo_service_server::{DemoService, DemoServiceServer};

/// Route of `DemoService.SayHello`.
pub const SAY_HELLO: &str = "/demo.DemoService/SayHello";
