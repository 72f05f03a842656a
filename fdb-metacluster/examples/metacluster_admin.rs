use bytes::Bytes;

use fdb_metacluster::command::metacluster_command;
use fdb_metacluster::database::MemDatabase;
use fdb_metacluster::{MetaclusterConfig, MetaclusterManagement};

use tokio::runtime::Runtime;

use std::env;
use std::error::Error;

// Runs each argument as one `metacluster` command line against an
// in-memory store, for example:
//
// cargo run --example metacluster_admin -- \
//   "register a connection_string=a:a@127.0.0.1:4500 max_tenant_groups=5" \
//   "list" "get a JSON"
fn main() -> Result<(), Box<dyn Error>> {
    let management = MetaclusterManagement::new(MemDatabase::new(), MetaclusterConfig::default());

    let rt = Runtime::new()?;

    rt.block_on(async {
        for line in env::args().skip(1) {
            let tokens = std::iter::once("metacluster")
                .chain(line.split_whitespace())
                .map(|t| Bytes::copy_from_slice(t.as_bytes()))
                .collect::<Vec<_>>();

            let res = metacluster_command(&management, &tokens).await;

            println!("> metacluster {}", line);
            if res.is_success() {
                println!("{}", res.output());
            } else {
                eprintln!("{}", res.output());
            }
        }
    });

    Ok(())
}
