use prep::{EventKind, EventRecord, Meeting};
use server::{response::ApiResponse, routes::meetings::AnalyzeMeetingsRequest};
use ts_rs::TS;

fn main() {
    let declarations = [
        AnalyzeMeetingsRequest::decl(),
        EventKind::decl(),
        EventRecord::decl(),
        Meeting::decl(),
        ApiResponse::<()>::decl(),
    ];

    println!("// This file was generated by `generate_types`. Do not edit it by hand.\n");
    for decl in declarations {
        println!("export {}\n", decl);
    }
}
