use criterion::{black_box, criterion_group, criterion_main, Criterion};

use molescope::derive::derive_positions;
use molescope::protocol::{parse_response, Command, START_FEN};
use molescope::rules::ChessRules;
use molescope::{Candidate, Move, Position};

const INFO_LINE: &str = "info depth 22 seldepth 31 multipv 1 score cp -38 upperbound nodes 2317418 nps 1473021 hashfull 811 tbhits 0 time 1573 pv d7d5 e4d5 d8d5 b1c3 d5a5 d2d4 g8f6 g1f3 c8f5";

fn bench_parse_info(c: &mut Criterion) {
    c.bench_function("parse_info_line", |b| {
        b.iter(|| parse_response(black_box(INFO_LINE)))
    });
}

fn bench_render_position(c: &mut Criterion) {
    let mut position = Position::from_fen(START_FEN);
    for mv in ["e2e4", "c7c5", "g1f3", "d7d6", "d2d4", "c5d4", "f3d4", "g8f6"] {
        position = position.with_move(Move::new(mv));
    }
    let command = Command::Position(position);
    c.bench_function("render_position_8_moves", |b| {
        b.iter(|| black_box(&command).to_string())
    });
}

fn bench_derive_candidates(c: &mut Criterion) {
    let base = Position::from_fen(START_FEN);
    let candidates: Vec<Candidate> = ["e2e4", "d2d4", "c2c4", "g1f3", "b1c3", "f2f4"]
        .iter()
        .enumerate()
        .map(|(i, mv)| Candidate::new(format!("p{}", i), Some(*mv)))
        .collect();
    c.bench_function("derive_6_candidates", |b| {
        b.iter(|| derive_positions(&ChessRules, black_box(&base), black_box(&candidates)))
    });
}

criterion_group!(
    benches,
    bench_parse_info,
    bench_render_position,
    bench_derive_candidates,
);
criterion_main!(benches);
