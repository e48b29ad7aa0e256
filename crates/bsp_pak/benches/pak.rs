use divan::AllocProfiler;

#[global_allocator]
static ALLOC: AllocProfiler = AllocProfiler::system();

fn main() {
    divan::main();
}

fn get_model() -> bsp_pak::ArchiveModel {
    let vmt = b"\"LightmappedGeneric\"\n{\n\t\"$basetexture\" \"custom/concrete01\"\n}\n";

    let mut model = bsp_pak::ArchiveModel::new();
    model.insert(bsp_pak::ArchiveEntry::directory("materials/custom"));
    for i in 0..200 {
        model.insert(bsp_pak::ArchiveEntry::file(
            format!("materials/custom/concrete{i:03}.vmt"),
            vmt.repeat(i % 16 + 1),
        ));
    }
    model
}

pub mod read {
    use divan::Bencher;

    #[divan::bench]
    fn decode(bencher: Bencher) {
        bencher
            .with_inputs(|| bsp_pak::encode(&super::get_model()).unwrap().data)
            .bench_refs(|data| {
                divan::black_box(bsp_pak::decode(data).unwrap());
            });
    }
}

pub mod write {
    use bsp_pak::{Capabilities, PakWriter, PakWriterOptions};
    use divan::Bencher;

    #[divan::bench(sample_count = 10)]
    fn encode_lzma(bencher: Bencher) {
        bencher.with_inputs(super::get_model).bench_refs(|model| {
            divan::black_box(bsp_pak::encode(model).unwrap());
        });
    }

    #[divan::bench]
    fn encode_deflate(bencher: Bencher) {
        let writer = PakWriter::new(
            PakWriterOptions::builder()
                .capabilities(Capabilities::minimal())
                .build(),
        );

        bencher.with_inputs(super::get_model).bench_refs(|model| {
            divan::black_box(writer.encode(model).unwrap());
        });
    }

    #[divan::bench]
    fn reencode_unchanged(bencher: Bencher) {
        bencher
            .with_inputs(|| {
                let data = bsp_pak::encode(&super::get_model()).unwrap().data;
                bsp_pak::decode(&data).unwrap().model
            })
            .bench_refs(|model| {
                divan::black_box(bsp_pak::encode(model).unwrap());
            });
    }

    #[divan::bench]
    fn merge(bencher: Bencher) {
        bencher
            .with_inputs(|| (super::get_model(), super::get_model()))
            .bench_refs(|(base, incoming)| {
                divan::black_box(base.merge(incoming));
            });
    }
}
