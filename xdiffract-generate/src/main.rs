mod parsers;

use std::io::Write;
use std::path::Path;

use xdiffract_data::ScatteringFactorDatabase;

fn main() {
    let root = Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .expect("workspace root");
    let data_dir = root.join("data_sources");

    if !data_dir.exists() {
        eprintln!("Error: data_sources directory not found at {:?}", data_dir);
        eprintln!("Expected Version.dat, elemental_data.txt and henke/<symbol>.nff tables");
        std::process::exit(1);
    }

    println!("Parsing raw data files from {:?}...", data_dir);

    let version = parsers::parse_version(&data_dir.join("Version.dat"));
    println!("  Version: {} entries", version.len());

    let elements = parsers::parse_elements(&data_dir.join("elemental_data.txt"));
    println!("  Elements: {} entries", elements.len());

    let scattering_factors = parsers::parse_henke(&data_dir.join("henke"), &elements);
    println!("  Henke: {} elements", scattering_factors.len());

    let db = ScatteringFactorDatabase {
        version,
        elements,
        scattering_factors,
    };

    println!("\nSerializing with postcard...");
    let serialized = postcard::to_allocvec(&db).expect("postcard serialization failed");
    println!(
        "  Serialized size: {} bytes ({:.2} MB)",
        serialized.len(),
        serialized.len() as f64 / 1_048_576.0
    );

    println!("Compressing with zstd (level 19)...");
    let compressed = zstd::encode_all(&serialized[..], 19).expect("zstd compression failed");
    println!(
        "  Compressed size: {} bytes, ratio {:.1}x",
        compressed.len(),
        serialized.len() as f64 / compressed.len() as f64
    );

    let out_path = root
        .join("xdiffract-lib")
        .join("data")
        .join("scattering_factors.bin.zst");
    std::fs::create_dir_all(out_path.parent().expect("output directory"))
        .expect("failed to create output directory");
    let mut f = std::fs::File::create(&out_path).expect("failed to create output file");
    f.write_all(&compressed)
        .expect("failed to write compressed data");
    println!("\nWrote {:?}", out_path);

    println!("Verifying round-trip deserialization...");
    let decompressed = zstd::decode_all(&compressed[..]).expect("zstd decompression failed");
    assert_eq!(decompressed.len(), serialized.len());
    let db2: ScatteringFactorDatabase =
        postcard::from_bytes(&decompressed).expect("postcard deserialization failed");
    assert_eq!(db2.scattering_factors.len(), db.scattering_factors.len());
    println!("  Round-trip OK!");
}
