#![cfg(test)]

use crate::{
    Database, Prg, SimplePir,
    pir::{Pir, run_fake_pir, run_pir, run_pir_compressed},
};

const SEC_PARAM: u64 = 1 << 10;
const LOGQ: u64 = 32;

#[test]
fn db_with_medium_entries() {
    const NUM: u64 = 4;
    const ROW_LENGTH: u64 = 9;

    let pir = SimplePir::new();
    let p = pir.pick_params(NUM, ROW_LENGTH, SEC_PARAM, LOGQ).unwrap();

    let vals = [1u64, 2, 3, 4];
    let db = Database::new(NUM, ROW_LENGTH, &p, &vals).unwrap();

    assert_eq!(db.info.packing, 1);
    assert_eq!(db.info.ne, 1);

    for i in 0..NUM {
        assert_eq!(db.get_elem(i).unwrap(), i + 1);
    }
}

#[test]
fn db_with_small_entries() {
    const NUM: u64 = 4;
    const ROW_LENGTH: u64 = 3;

    let pir = SimplePir::new();
    let p = pir.pick_params(NUM, ROW_LENGTH, SEC_PARAM, LOGQ).unwrap();

    let vals = [1u64, 2, 3, 4];
    let db = Database::new(NUM, ROW_LENGTH, &p, &vals).unwrap();

    assert!(db.info.packing > 1);
    assert_eq!(db.info.ne, 1);

    for i in 0..NUM {
        assert_eq!(db.get_elem(i).unwrap(), i + 1);
    }
}

#[test]
fn db_with_large_entries() {
    const NUM: u64 = 4;
    const ROW_LENGTH: u64 = 12;

    let pir = SimplePir::new();
    let p = pir.pick_params(NUM, ROW_LENGTH, SEC_PARAM, LOGQ).unwrap();

    let vals = [1u64, 2, 3, 4];
    let db = Database::new(NUM, ROW_LENGTH, &p, &vals).unwrap();

    assert_eq!(db.info.packing, 0);
    assert!(db.info.ne > 1);

    for i in 0..NUM {
        assert_eq!(db.get_elem(i).unwrap(), i + 1);
    }
}

#[test]
fn db_interleaving_reassembles_strings_bytewise() {
    const NUM: u64 = 16;
    const ROW_LENGTH: u64 = 8;

    let strings = (0..NUM).map(|i| format!("string {}", i)).collect::<Vec<String>>();
    let num_bytes = strings.iter().map(|s| s.len()).max().unwrap() as u64;

    let pir = SimplePir::new();
    let mut p = pir.pick_params(NUM, ROW_LENGTH, SEC_PARAM, LOGQ).unwrap();

    // One single-byte-wide database per byte position.
    let mut dbs = Vec::with_capacity(num_bytes as usize);
    for n in 0..num_bytes as usize {
        let vals = strings.iter().map(|s| s.as_bytes().get(n).map(|&b| b as u64).unwrap_or(0)).collect::<Vec<u64>>();
        dbs.push(Database::new(NUM, ROW_LENGTH, &p, &vals).unwrap());
    }

    let db = pir.concat_dbs(&dbs, &mut p).unwrap();
    assert_eq!(db.info.num, NUM * num_bytes);

    for i in 0..NUM {
        let mut bytes = Vec::new();
        for n in 0..num_bytes {
            let byte = db.get_elem(i + NUM * n).unwrap() as u8;
            if byte != 0 {
                bytes.push(byte);
            }
        }

        assert_eq!(String::from_utf8(bytes).unwrap(), strings[i as usize]);
    }
}

#[test]
fn full_protocol_run_over_a_million_records() {
    const NUM: u64 = 1 << 20;
    const ROW_LENGTH: u64 = 8;

    let pir = SimplePir::new();
    let mut prg = Prg::from_os_rng();

    let p = pir.pick_params(NUM, ROW_LENGTH, SEC_PARAM, LOGQ).unwrap();
    let mut db = Database::random(&mut prg, NUM, ROW_LENGTH, &p).unwrap();

    // The driver verifies the recovered record against the database.
    let report = run_pir(&pir, &mut db, &p, &mut prg, &[0]).unwrap();

    assert!((report.offline_comm_kb + report.online_comm_kb - report.total_comm_kb).abs() <= 1e-6);
    assert!(report.rate_mb_per_s > 0.0);
}

#[test]
fn batched_runs_with_duplicate_and_distinct_indices() {
    const NUM: u64 = 1 << 16;
    const ROW_LENGTH: u64 = 8;

    let pir = SimplePir::new();
    let mut prg = Prg::from_os_rng();

    let p = pir.pick_params(NUM, ROW_LENGTH, SEC_PARAM, LOGQ).unwrap();
    let mut db = Database::random(&mut prg, NUM, ROW_LENGTH, &p).unwrap();

    for batch in [vec![0u64], vec![0, 0], vec![0, 0, 0, 0], vec![1, 2, 3, 4]] {
        let report = run_pir(&pir, &mut db, &p, &mut prg, &batch).unwrap();
        assert!((report.offline_comm_kb + report.online_comm_kb - report.total_comm_kb).abs() <= 1e-6);
    }
}

#[test]
fn long_row_records_span_several_cells() {
    const NUM: u64 = 1 << 16;
    const ROW_LENGTH: u64 = 32;

    let pir = SimplePir::new();
    let mut prg = Prg::from_os_rng();

    let p = pir.pick_params(NUM, ROW_LENGTH, SEC_PARAM, LOGQ).unwrap();
    let mut db = Database::random(&mut prg, NUM, ROW_LENGTH, &p).unwrap();
    assert!(db.info.ne > 1);

    run_pir(&pir, &mut db, &p, &mut prg, &[1]).unwrap();
    run_pir(&pir, &mut db, &p, &mut prg, &[0, 0]).unwrap();
}

#[test]
fn compressed_shared_state_run() {
    const NUM: u64 = 1 << 14;
    const ROW_LENGTH: u64 = 8;

    let pir = SimplePir::new();
    let mut prg = Prg::from_os_rng();

    let p = pir.pick_params(NUM, ROW_LENGTH, SEC_PARAM, LOGQ).unwrap();
    let mut db = Database::random(&mut prg, NUM, ROW_LENGTH, &p).unwrap();

    let report = run_pir_compressed(&pir, &mut db, &p, &mut prg, &[7]).unwrap();
    assert!((report.offline_comm_kb + report.online_comm_kb - report.total_comm_kb).abs() <= 1e-6);
}

#[test]
fn faked_offline_phase_reports_the_theoretical_hint_size() {
    const NUM: u64 = 1 << 16;
    const ROW_LENGTH: u64 = 8;

    let pir = SimplePir::new();
    let mut prg = Prg::from_os_rng();

    let p = pir.pick_params(NUM, ROW_LENGTH, SEC_PARAM, LOGQ).unwrap();
    let mut db = Database::random(&mut prg, NUM, ROW_LENGTH, &p).unwrap();

    let expected_offline = pir.bandwidth(&db.info, &p).offline_download_kb;
    let report = run_fake_pir(&pir, &mut db, &p, &mut prg, &[0]).unwrap();

    assert!((report.offline_comm_kb - expected_offline).abs() < 1e-9);

    // The database survives the fake cycle in answering-ready form again.
    let report = run_fake_pir(&pir, &mut db, &p, &mut prg, &[3]).unwrap();
    assert!((report.offline_comm_kb + report.online_comm_kb - report.total_comm_kb).abs() <= 1e-6);
}
