//! Property-based tests over the laws a correct identifier/demuxer/PAF
//! round-trip must satisfy, independent of any one example file.

use quickcheck::TestResult;
use quickcheck_macros::quickcheck;
use std::io::Cursor;
use tspaf::demux::{Demux, DemuxConfig, NoopProgressSink, DEFAULT_EXCLUDED_PIDS};
use tspaf::packet::{AdaptationFieldControl, TsPacket};
use tspaf::paf::{PafReader, PafWriter};
use tspaf::pes::PesPacket;
use tspaf::shape::PacketShape;
use tspaf::stream::PacketStream;
use tspaf::ErrorDetails;

fn fill_byte(seed: u8, i: usize, k: usize) -> u8 {
    let v = seed
        .wrapping_add((i & 0xFF) as u8)
        .wrapping_add((k & 0xFF) as u8);
    if v == 0x47 {
        0x00
    } else {
        v
    }
}

/// Invariant 1 + 5: identification recovers exactly the header/trailer
/// split a file was synthesized with, and is a pure function of its prefix.
#[quickcheck]
fn identification_round_trip(
    header_choice: u8,
    trailer_choice: u8,
    packet_count: u8,
    seed: u8,
) -> TestResult {
    let header_len = match header_choice % 3 {
        0 => 0,
        1 => 4,
        _ => 7,
    };
    let trailer_len = match trailer_choice % 3 {
        0 => 0,
        1 => 16,
        _ => 5,
    };
    let n = (packet_count % 16) as usize + 8;
    let stride = 188 + header_len + trailer_len;

    let mut buf = Vec::with_capacity(n * stride);
    for i in 0..n {
        for k in 0..header_len {
            buf.push(fill_byte(seed, i, k));
        }
        buf.push(0x47);
        buf.push(0x01);
        for k in 0..186 {
            buf.push(fill_byte(seed, i, 99 + k));
        }
        for k in 0..trailer_len {
            buf.push(fill_byte(seed, i, 200 + k));
        }
    }

    let first = PacketShape::detect(&buf);
    let second = PacketShape::detect(&buf);
    match (first, second) {
        (Ok(a), Ok(b)) => TestResult::from_bool(
            a == b
                && a.header_len == header_len
                && a.trailer_len == trailer_len
                && a.first_packet_offset == 0,
        ),
        _ => TestResult::failed(),
    }
}

/// Invariant 6: every successfully parsed `TsPacket` has a non-reserved
/// adaptation field control value; the reserved `0b00` pattern is always
/// rejected.
#[quickcheck]
fn afc_invariant(afc_bits: u8, pid_bits: u16) -> TestResult {
    let afc = afc_bits & 0x3;
    let pid = pid_bits & 0x1FFF;
    let mut data = [0u8; 188];
    data[0] = 0x47;
    data[1] = ((pid >> 8) as u8) & 0x1F;
    data[2] = (pid & 0xFF) as u8;
    data[3] = afc << 4;
    if afc == 0b10 || afc == 0b11 {
        // A minimal, valid adaptation field: length 1, no flags, no body.
        data[4] = 1;
        data[5] = 0;
    }

    match TsPacket::parse(&data) {
        Ok(p) => TestResult::from_bool(
            afc != 0b00
                && p.pid() == pid
                && matches!(
                    p.adaptation_field_control(),
                    AdaptationFieldControl::PayloadOnly
                        | AdaptationFieldControl::AdaptationOnly
                        | AdaptationFieldControl::Both
                ),
        ),
        Err(e) => TestResult::from_bool(afc == 0b00 && matches!(e.details, ErrorDetails::InvalidAFC)),
    }
}

fn encode_timestamp(nibble: u8, ts: u64) -> [u8; 5] {
    let mut b = [0u8; 5];
    b[0] = (nibble << 4) | (((ts >> 29) & 0x0E) as u8) | 1;
    b[1] = ((ts >> 22) & 0xFF) as u8;
    b[2] = (((ts >> 14) & 0xFE) as u8) | 1;
    b[3] = ((ts >> 7) & 0xFF) as u8;
    b[4] = (((ts << 1) & 0xFE) as u8) | 1;
    b
}

fn build_pes(pts: u64, dts: u64, payload_len: usize) -> Vec<u8> {
    let mut out = vec![0x00, 0x00, 0x01, 0xC0, 0, 0];
    out.push(0x80);
    out.push(0xC0);
    out.push(10);
    out.extend_from_slice(&encode_timestamp(0b0011, pts));
    out.extend_from_slice(&encode_timestamp(0b0001, dts));
    out.extend(std::iter::repeat(0x5A).take(payload_len));
    let total_len = out.len() - 6;
    out[4] = (total_len >> 8) as u8;
    out[5] = (total_len & 0xFF) as u8;
    out
}

fn ts_packet(pid: u16, pusi: bool, cc: u8, payload: &[u8]) -> [u8; 188] {
    let mut pkt = [0u8; 188];
    pkt[0] = 0x47;
    pkt[1] = (if pusi { 0x40 } else { 0x00 }) | ((pid >> 8) as u8 & 0x1F);
    pkt[2] = (pid & 0xFF) as u8;
    pkt[3] = 0x10 | (cc & 0x0F);
    pkt[4..4 + payload.len()].copy_from_slice(payload);
    pkt
}

fn packetize(pid: u16, data: &[u8]) -> Vec<[u8; 188]> {
    data.chunks(184)
        .enumerate()
        .map(|(i, chunk)| ts_packet(pid, i == 0, i as u8, chunk))
        .collect()
}

/// Invariants 3 + 4: writing a `(pts, dts, tp_count, pes_len)` sequence to a
/// `.paf` file and reading it back yields exactly the same fields, including
/// the bit-exact temporal block packing that carries `pts`/`dts`.
#[quickcheck]
fn paf_round_trip(ptss: Vec<u32>, dts_deltas: Vec<u32>) -> TestResult {
    if ptss.is_empty() {
        return TestResult::discard();
    }
    let dir = tempfile::tempdir().unwrap();
    let mut writer = PafWriter::new(dir.path());

    const MASK33: u64 = (1u64 << 33) - 1;
    let mut expected = Vec::new();
    for (i, &p) in ptss.iter().enumerate() {
        let pts = (p as u64) & MASK33;
        let delta = *dts_deltas.get(i).unwrap_or(&0) as u64;
        let dts = pts.saturating_sub(delta % (pts + 1));
        if pts == 0 && dts == 0 {
            continue;
        }
        let pes_bytes = build_pes(pts, dts, 16);
        let pes = PesPacket::parse(&pes_bytes).unwrap();
        let tp_count = (i as u16).wrapping_add(1);
        writer.add_packet(0x0140, &pes, tp_count).unwrap();
        expected.push((tp_count, pes.len() as u32, pts, dts));
    }
    if expected.is_empty() {
        return TestResult::discard();
    }

    let mut reader = PafReader::open(&dir.path().join("0140.paf")).unwrap();
    for (tp_count, pck_size, pts, dts) in expected {
        let record = match reader.next_record().unwrap() {
            Some(r) => r,
            None => return TestResult::failed(),
        };
        if record.tp_count != tp_count
            || record.pck_size != pck_size
            || record.pts != pts
            || record.dts != dts
        {
            return TestResult::failed();
        }
    }
    TestResult::from_bool(reader.next_record().unwrap().is_none())
}

/// Invariant 7: no PAF record is ever emitted for a statically excluded PID.
#[quickcheck]
fn exclusion_invariant(pid_bits: u16) -> TestResult {
    let pid = pid_bits & 0x1FFF;
    if pid == 0 {
        return TestResult::discard();
    }
    let excluded = DEFAULT_EXCLUDED_PIDS.contains(&pid);

    let pes = build_pes(0x0_0001_0000, 0x0_0001_0000, 32);
    let packets = packetize(pid, &pes);
    let mut raw = Vec::new();
    for p in &packets {
        raw.extend_from_slice(p);
    }

    let dir = tempfile::tempdir().unwrap();
    let mut stream = PacketStream::open_transport_stream(Cursor::new(raw)).unwrap();
    let mut demux = Demux::new(DemuxConfig::default());
    if demux
        .run(&mut stream, dir.path(), &mut NoopProgressSink)
        .is_err()
    {
        return TestResult::discard();
    }

    let path = dir.path().join(format!("{:04X}.paf", pid));
    TestResult::from_bool(path.exists() != excluded)
}

/// Invariant 2: interleaved PES units on distinct PIDs are reassembled and
/// emitted in each PID's own construction order.
#[test]
fn pes_reassembly_preserves_per_pid_order() {
    let pids = [0x0150u16, 0x0151u16];
    let pts_sequences: [[u64; 3]; 2] = [[1000, 2000, 3000], [5000, 6000, 7000]];

    let mut per_pid_packets: Vec<Vec<[u8; 188]>> = Vec::new();
    for (pid, seq) in pids.iter().zip(pts_sequences.iter()) {
        let mut packets = Vec::new();
        for &pts in seq {
            let pes = build_pes(pts, pts, 8);
            packets.extend(packetize(*pid, &pes));
        }
        per_pid_packets.push(packets);
    }

    // Interleave round-robin so no single PID's packets stay contiguous.
    let mut raw = Vec::new();
    let max_len = per_pid_packets.iter().map(|v| v.len()).max().unwrap();
    for i in 0..max_len {
        for packets in &per_pid_packets {
            if let Some(p) = packets.get(i) {
                raw.extend_from_slice(p);
            }
        }
    }

    let dir = tempfile::tempdir().unwrap();
    let mut stream = PacketStream::open_transport_stream(Cursor::new(raw)).unwrap();
    let mut demux = Demux::new(DemuxConfig::default());
    demux
        .run(&mut stream, dir.path(), &mut NoopProgressSink)
        .unwrap();

    for (pid, seq) in pids.iter().zip(pts_sequences.iter()) {
        let mut reader = PafReader::open(&dir.path().join(format!("{:04X}.paf", pid))).unwrap();
        for &expected_pts in seq {
            let record = reader.next_record().unwrap().unwrap();
            assert_eq!(record.pts, expected_pts);
        }
        assert!(reader.next_record().unwrap().is_none());
    }
}
