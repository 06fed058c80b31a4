//! SimplePIR: a Rust library implementation of a fast single-server **P**rivate **I**nformation **R**etrieval scheme built directly on the Learning-With-Errors assumption.
//!
//! A client retrieves one record of a server-held database without revealing to the server which record it asked for.
//! The database is encoded as a roughly square matrix over a small plaintext modulus; after a one-time offline hint
//! download, each online query costs the server one pass over the (bit-packed) database matrix, and batches of
//! independent queries share that single pass.
//!
//! ## Features
//!
//! * **Single-server privacy:** the server learns nothing about queried indices; security reduces to LWE with the
//!   parameter sets embedded in this crate.
//! * **Offline/online split:** the hint (`DB · A`) is downloaded once and amortized over any number of queries.
//! * **Batched answering:** `k` non-adaptive queries are answered in one pass over the database at roughly the
//!   online-download cost of one.
//! * **Seed-compressed setup:** the shared public matrix can travel as a 16-byte seed; both sides regenerate it
//!   bit-for-bit from the same pseudorandom stream.
//!
//! ## Usage
//!
//! Add SimplePIR as a dependency to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! simple_pir = "0.1.0"
//! ```
//!
//! Then drive the four-message exchange directly:
//!
//! ```rust
//! use simple_pir::{Database, MsgSlice, Prg, SimplePir, pir::Pir};
//!
//! fn main() {
//!     let pir = SimplePir::new();
//!     let mut prg = Prg::from_os_rng();
//!
//!     // 1024 records of 8 bits each.
//!     let num_records = 1024;
//!     let record_bits = 8;
//!     let p = pir.pick_params(num_records, record_bits, 1 << 10, 32).expect("no known LWE parameters");
//!
//!     let vals = (0..num_records).map(|i| i % 256).collect::<Vec<u64>>();
//!     let mut db = Database::new(num_records, record_bits, &p, &vals).expect("database encoding failed");
//!
//!     // Offline phase: shared matrix + hint.
//!     let shared = pir.init(&db.info, &p, &mut prg);
//!     let (server_state, hint) = pir.setup(&mut db, &shared, &p).expect("server setup failed");
//!
//!     // Online phase, for record 42.
//!     let (client_state, query) = pir.query(42, &shared, &p, &db.info, &mut prg).expect("query failed");
//!     let queries = MsgSlice::new(vec![query]);
//!     let mut answer = pir.answer(&db, &queries, &server_state, &shared, &p).expect("server failed to answer");
//!
//!     let value = pir
//!         .recover(42, 0, &hint, &queries.data[0], &mut answer, &shared, &client_state, &p, &db.info)
//!         .expect("recovery failed");
//!     assert_eq!(value, 42);
//! }
//! ```
//!
//! ## Modules
//!
//! * `pir`: the scheme-agnostic capability trait [`pir::Pir`] plus drivers that run and measure whole protocol
//!   exchanges.
//! * `simple_pir`: the concrete single-layer scheme [`SimplePir`].

pub use pir_internals::database::{Database, DbInfo};
pub use pir_internals::error::SimplePirError;
pub use pir_internals::matrix::Matrix;
pub use pir_internals::message::{CompressedState, Msg, MsgSlice, State};
pub use pir_internals::params::{Params, SEED_BYTE_LEN};
pub use pir_internals::prg::{Prg, PrgSeed};

pub mod pir;
pub mod simple_pir;

pub use simple_pir::SimplePir;

mod pir_internals;

mod test_pir;
