// Build script for grpc-prom
// Generates the DemoService server and client stubs. Message types are
// declared by hand in src/proto.rs, so no protoc is needed here.
//
// Numan Thabit 2025 Nov

fn main() {
    let say_hello = tonic_build::manual::Method::builder()
        .name("say_hello")
        .route_name("SayHello")
        .input_type("crate::proto::HelloRequest")
        .output_type("crate::proto::HelloResponse")
        .codec_path("tonic::codec::ProstCodec")
        .build();

    let demo_service = tonic_build::manual::Service::builder()
        .name("DemoService")
        .package("demo")
        .method(say_hello)
        .build();

    tonic_build::manual::Builder::new().compile(&[demo_service]);
}
