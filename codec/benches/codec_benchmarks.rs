//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Benchmarks for the relay wire codec

use bytes::BytesMut;
use criterion::{criterion_group, criterion_main, Criterion};
use parley_codec::{ClientId, RelayCodec, RelayMessage};
use std::hint::black_box;
use tokio_util::codec::{Decoder, Encoder};

fn bench_encode(c: &mut Criterion) {
    let msg = RelayMessage::chat(ClientId::new(42), "the quick brown fox jumps over").unwrap();

    c.bench_function("encode_chat", |b| {
        let mut codec = RelayCodec::new();
        let mut buf = BytesMut::with_capacity(256);
        b.iter(|| {
            buf.clear();
            codec.encode(black_box(&msg), &mut buf).unwrap();
            black_box(&buf);
        });
    });
}

fn bench_decode(c: &mut Criterion) {
    let msg = RelayMessage::chat(ClientId::new(42), "the quick brown fox jumps over").unwrap();
    let mut codec = RelayCodec::new();
    let mut wire = BytesMut::new();
    codec.encode(&msg, &mut wire).unwrap();
    let wire = wire.freeze();

    c.bench_function("decode_chat", |b| {
        let mut codec = RelayCodec::new();
        b.iter(|| {
            let mut buf = BytesMut::from(&wire[..]);
            black_box(codec.decode(&mut buf).unwrap());
        });
    });
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
