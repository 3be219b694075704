use aprsgate::ax25::{decode_frame, encode_command};
use aprsgate::frame::{Address, Frame, Info};
use aprsgate::framing::KissParser;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn sample() -> Frame {
    Frame {
        source: Address::new("N0CALL", 9),
        dest: Address::new("APRS", 0),
        path: vec![Address::new("WIDE1", 1), Address::new("WIDE2", 2)],
        body: Info::from("!4903.50N/07201.75W-test /A=001234"),
    }
}

fn bench_encode(c: &mut Criterion) {
    let frame = sample();
    c.bench_function("ax25_encode_command", |b| {
        b.iter(|| black_box(encode_command(black_box(&frame))))
    });
}

fn bench_decode(c: &mut Criterion) {
    let raw = encode_command(&sample());
    c.bench_function("ax25_decode_frame", |b| {
        b.iter(|| black_box(decode_frame(black_box(&raw)).unwrap()))
    });
}

fn bench_kiss_split(c: &mut Criterion) {
    let raw = encode_command(&sample());
    let mut stream = Vec::new();
    for _ in 0..16 {
        stream.extend_from_slice(&raw);
    }

    c.bench_function("kiss_split_16_frames", |b| {
        b.iter(|| {
            let mut parser = KissParser::new();
            parser.push(black_box(&stream));
            let mut count = 0;
            while parser.parse_next().is_some() {
                count += 1;
            }
            black_box(count)
        })
    });
}

fn bench_textual_parse(c: &mut Criterion) {
    let line = "N0CALL-9>APRS,WIDE1-1,WIDE2-2:!4903.50N/07201.75W-test /A=001234";
    c.bench_function("frame_parse_textual", |b| {
        b.iter(|| black_box(Frame::parse(black_box(line)).unwrap()))
    });
}

criterion_group!(
    benches,
    bench_encode,
    bench_decode,
    bench_kiss_split,
    bench_textual_parse
);
criterion_main!(benches);
