use crate::pir_internals::{
    branch_opt_util,
    database::{Database, DbInfo},
    error::SimplePirError,
    message::{CompressedState, Msg, MsgSlice, State},
    params::Params,
    prg::Prg,
};
use std::time::Instant;

/// The three communication legs of one protocol run, in kilobytes. Every
/// figure is `cells * logq` bits, the accounting used throughout this crate.
#[derive(Clone, Copy, Debug)]
pub struct Bandwidth {
    pub offline_download_kb: f64,
    pub online_upload_kb: f64,
    pub online_download_kb: f64,
}

impl Bandwidth {
    pub fn total_kb(&self) -> f64 {
        self.offline_download_kb + self.online_upload_kb + self.online_download_kb
    }
}

/// Measurements of one driven protocol run: answering throughput and the
/// communication split.
#[derive(Clone, Copy, Debug)]
pub struct RunReport {
    /// Server answering rate over the plaintext database, in MB/s.
    pub rate_mb_per_s: f64,
    pub total_comm_kb: f64,
    pub offline_comm_kb: f64,
    pub online_comm_kb: f64,
}

/// Capability set of a PIR-with-preprocessing scheme. A concrete scheme is
/// chosen at construction time and used through this trait; the single-layer
/// scheme lives in [`crate::simple_pir::SimplePir`], and a recursive variant
/// is its natural sibling.
///
/// Per database instance the protocol steps run as
/// `init` (or `init_compressed`/`decompress_state`) -> `setup` (or
/// `fake_setup`) -> `query`* -> `answer` -> `recover`* -> `reset`.
/// `setup`, `fake_setup` and `reset` mutate the database in place and must
/// not interleave with `answer`; `query` and `recover` touch only
/// client-local state and are free to run for any number of independent
/// indices.
pub trait Pir {
    fn name(&self) -> &'static str;

    /// Searches for the tightest plaintext modulus the parameter table
    /// accepts for a database of `num` records of `row_length` bits, at LWE
    /// dimension `sec_dim` and ciphertext modulus `2^logq`.
    fn pick_params(&self, num: u64, row_length: u64, sec_dim: u64, logq: u64) -> Result<Params, SimplePirError>;

    /// Builds a parameter set for externally fixed matrix dimensions.
    fn pick_params_given_dimensions(&self, l: u64, m: u64, sec_dim: u64, logq: u64) -> Result<Params, SimplePirError>;

    /// Reports the communication cost of one run; no protocol side effects.
    fn bandwidth(&self, info: &DbInfo, p: &Params) -> Bandwidth;

    /// Publishes the shared public matrix, drawn from the caller's generator.
    fn init(&self, info: &DbInfo, p: &Params, prg: &mut Prg) -> State;

    /// As [`Pir::init`], but derives the shared state from a fresh seed so
    /// that its transfer shrinks to the seed itself.
    fn init_compressed(&self, info: &DbInfo, p: &Params, prg: &mut Prg) -> (State, CompressedState);

    /// Regenerates the exact shared state a peer built from the same seed.
    fn decompress_state(&self, info: &DbInfo, p: &Params, comp: &CompressedState) -> State;

    /// Offline phase: computes the hint message and converts the database
    /// into its packed answering layout.
    fn setup(&self, db: &mut Database, shared: &State, p: &Params) -> Result<(State, Msg), SimplePirError>;

    /// Benchmarking variant of [`Pir::setup`]: performs the same database
    /// conversion but skips the hint computation, returning the theoretical
    /// offline download in kilobytes instead.
    fn fake_setup(&self, db: &mut Database, p: &Params) -> Result<(State, f64), SimplePirError>;

    /// Builds one encrypted query for record index `i`. The returned client
    /// state holds the query secret and must be retained until the matching
    /// [`Pir::recover`].
    fn query(&self, i: u64, shared: &State, p: &Params, info: &DbInfo, prg: &mut Prg) -> Result<(State, Msg), SimplePirError>;

    /// Answers a batch of independent queries in one pass over the packed
    /// database.
    fn answer(&self, db: &Database, queries: &MsgSlice, server: &State, shared: &State, p: &Params) -> Result<Msg, SimplePirError>;

    /// Denoises, rounds and unpacks the answer rows belonging to record `i`.
    /// The answer buffer is borrowed mutably as scratch space and restored
    /// before returning, so one buffer serves every query of a batch.
    #[allow(clippy::too_many_arguments)]
    fn recover(
        &self,
        i: u64,
        batch_index: u64,
        offline: &Msg,
        query: &Msg,
        answer: &mut Msg,
        shared: &State,
        client: &State,
        p: &Params,
        info: &DbInfo,
    ) -> Result<u64, SimplePirError>;

    /// Returns the database to its pre-setup representation so it can serve
    /// another setup/answer cycle.
    fn reset(&self, db: &mut Database, p: &Params) -> Result<(), SimplePirError>;
}

fn comm_kb(cells: u64, logq: u64) -> f64 {
    (cells * logq) as f64 / (8.0 * 1024.0)
}

fn answer_rate_mb_per_s(p: &Params, elapsed_secs: f64, num_queries: usize) -> f64 {
    (p.p as f64).log2() * (p.l * p.m) as f64 * num_queries as f64 / (8.0 * 1024.0 * 1024.0 * elapsed_secs)
}

fn check_batch_capacity(db: &Database, num_queries: usize) -> Result<(), SimplePirError> {
    if branch_opt_util::unlikely(num_queries == 0 || db.data.num_rows() / (num_queries as u64) < db.info.ne) {
        return Err(SimplePirError::ConfigurationError(format!(
            "a database of {} rows cannot serve {} queries per batch",
            db.data.num_rows(),
            num_queries
        )));
    }
    Ok(())
}

/// Drives a full offline + online protocol run for one batch of record
/// indices, verifying every recovered record against the database.
///
/// Each index is queried relative to its own batch partition, i.e. slot `k`
/// retrieves record `indices[k] + k * batch_size`.
///
/// # Panics
///
/// Panics if a recovered record disagrees with the database, or if the
/// accounted communication legs fail to sum to the measured total. Both
/// conditions are unreachable unless the engine itself is broken.
pub fn run_pir<P: Pir>(scheme: &P, db: &mut Database, p: &Params, prg: &mut Prg, indices: &[u64]) -> Result<RunReport, SimplePirError> {
    check_batch_capacity(db, indices.len())?;
    let batch_sz = db.data.num_rows() / (db.info.ne * indices.len() as u64) * db.data.num_cols();

    let shared_state = scheme.init(&db.info, p, prg);

    let (server_state, offline_msg) = scheme.setup(db, &shared_state, p)?;
    let offline_comm = comm_kb(offline_msg.size(), p.logq);
    let mut total = offline_comm;

    let mut client_states = Vec::with_capacity(indices.len());
    let mut queries = MsgSlice::default();
    for (slot, &i) in indices.iter().enumerate() {
        let index_to_query = i + slot as u64 * batch_sz;
        let (client_state, query) = scheme.query(index_to_query, &shared_state, p, &db.info, prg)?;
        client_states.push(client_state);
        queries.data.push(query);
    }
    let mut online_comm = comm_kb(queries.size(), p.logq);
    total += online_comm;

    let start = Instant::now();
    let mut answer = scheme.answer(db, &queries, &server_state, &shared_state, p)?;
    let rate = answer_rate_mb_per_s(p, start.elapsed().as_secs_f64(), indices.len());

    let online_download = comm_kb(answer.size(), p.logq);
    online_comm += online_download;
    total += online_download;

    scheme.reset(db, p)?;

    for (slot, &i) in indices.iter().enumerate() {
        let index_to_query = i + slot as u64 * batch_sz;
        let got = scheme.recover(
            index_to_query,
            slot as u64,
            &offline_msg,
            &queries.data[slot],
            &mut answer,
            &shared_state,
            &client_states[slot],
            p,
            &db.info,
        )?;

        let expected = db.get_elem(index_to_query)?;
        if got != expected {
            branch_opt_util::cold();
            panic!("batch {} (record {}): reconstructed {} instead of {}", slot, index_to_query, got, expected);
        }
    }

    if (offline_comm + online_comm - total).abs() > 1e-6 {
        branch_opt_util::cold();
        panic!("communication legs ({} + {} KB) do not sum to the measured total ({} KB)", offline_comm, online_comm, total);
    }

    Ok(RunReport {
        rate_mb_per_s: rate,
        total_comm_kb: total,
        offline_comm_kb: offline_comm,
        online_comm_kb: online_comm,
    })
}

/// As [`run_pir`], but the shared matrix travels as a seed: the server keeps
/// the state it drew, the client regenerates its own copy from the seed.
pub fn run_pir_compressed<P: Pir>(scheme: &P, db: &mut Database, p: &Params, prg: &mut Prg, indices: &[u64]) -> Result<RunReport, SimplePirError> {
    check_batch_capacity(db, indices.len())?;
    let batch_sz = db.data.num_rows() / (db.info.ne * indices.len() as u64) * db.data.num_cols();

    let (server_shared_state, compressed) = scheme.init_compressed(&db.info, p, prg);
    let client_shared_state = scheme.decompress_state(&db.info, p, &compressed);

    let (server_state, offline_msg) = scheme.setup(db, &server_shared_state, p)?;
    let offline_comm = comm_kb(offline_msg.size(), p.logq);
    let mut total = offline_comm;

    let mut client_states = Vec::with_capacity(indices.len());
    let mut queries = MsgSlice::default();
    for (slot, &i) in indices.iter().enumerate() {
        let index_to_query = i + slot as u64 * batch_sz;
        let (client_state, query) = scheme.query(index_to_query, &client_shared_state, p, &db.info, prg)?;
        client_states.push(client_state);
        queries.data.push(query);
    }
    let mut online_comm = comm_kb(queries.size(), p.logq);
    total += online_comm;

    let start = Instant::now();
    let mut answer = scheme.answer(db, &queries, &server_state, &server_shared_state, p)?;
    let rate = answer_rate_mb_per_s(p, start.elapsed().as_secs_f64(), indices.len());

    let online_download = comm_kb(answer.size(), p.logq);
    online_comm += online_download;
    total += online_download;

    scheme.reset(db, p)?;

    for (slot, &i) in indices.iter().enumerate() {
        let index_to_query = i + slot as u64 * batch_sz;
        let got = scheme.recover(
            index_to_query,
            slot as u64,
            &offline_msg,
            &queries.data[slot],
            &mut answer,
            &client_shared_state,
            &client_states[slot],
            p,
            &db.info,
        )?;

        let expected = db.get_elem(index_to_query)?;
        if got != expected {
            branch_opt_util::cold();
            panic!("batch {} (record {}): reconstructed {} instead of {}", slot, index_to_query, got, expected);
        }
    }

    if (offline_comm + online_comm - total).abs() > 1e-6 {
        branch_opt_util::cold();
        panic!("communication legs ({} + {} KB) do not sum to the measured total ({} KB)", offline_comm, online_comm, total);
    }

    Ok(RunReport {
        rate_mb_per_s: rate,
        total_comm_kb: total,
        offline_comm_kb: offline_comm,
        online_comm_kb: online_comm,
    })
}

/// Runs the online phase against a faked offline phase (no hint is
/// computed), for accurate online-cost measurements in isolation. Queries
/// are built and answered but nothing is recovered.
///
/// # Panics
///
/// Panics if the accounted communication legs fail to sum to the measured
/// total.
pub fn run_fake_pir<P: Pir>(scheme: &P, db: &mut Database, p: &Params, prg: &mut Prg, indices: &[u64]) -> Result<RunReport, SimplePirError> {
    check_batch_capacity(db, indices.len())?;

    let shared_state = scheme.init(&db.info, p, prg);

    let (server_state, offline_comm) = scheme.fake_setup(db, p)?;
    let mut total = offline_comm;

    let mut queries = MsgSlice::default();
    for &i in indices {
        let (_, query) = scheme.query(i, &shared_state, p, &db.info, prg)?;
        queries.data.push(query);
    }
    let mut online_comm = comm_kb(queries.size(), p.logq);
    total += online_comm;

    let start = Instant::now();
    let answer = scheme.answer(db, &queries, &server_state, &shared_state, p)?;
    let rate = answer_rate_mb_per_s(p, start.elapsed().as_secs_f64(), indices.len());

    let online_download = comm_kb(answer.size(), p.logq);
    online_comm += online_download;
    total += online_download;

    scheme.reset(db, p)?;

    if (offline_comm + online_comm - total).abs() > 1e-6 {
        branch_opt_util::cold();
        panic!("communication legs ({} + {} KB) do not sum to the measured total ({} KB)", offline_comm, online_comm, total);
    }

    Ok(RunReport {
        rate_mb_per_s: rate,
        total_comm_kb: total,
        offline_comm_kb: offline_comm,
        online_comm_kb: online_comm,
    })
}
