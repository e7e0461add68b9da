use std::env;
use std::fs;
use std::path::Path;

fn main() {
    // Windowsでローカル展開したOpenCVを使う場合のDLLコピー。
    // システムインストール（vcpkg/パッケージマネージャ）の場合は何もしない。
    let manifest_dir = env::var("CARGO_MANIFEST_DIR").unwrap();
    let opencv_bin_dir = Path::new(&manifest_dir)
        .join("third_party")
        .join("opencv")
        .join("build")
        .join("x64")
        .join("vc16")
        .join("bin");

    if !opencv_bin_dir.exists() {
        return;
    }

    // ビルドプロファイルに応じた出力ディレクトリを決定
    let out_dir = env::var("OUT_DIR").unwrap();
    let target_dir = Path::new(&out_dir)
        .ancestors()
        .nth(3) // OUT_DIR is target/<profile>/build/<pkg>/out, so go up 3 levels to target/<profile>
        .unwrap();

    copy_opencv_dlls(&opencv_bin_dir, target_dir);

    println!("cargo:rerun-if-changed=third_party/opencv/build/x64/vc16/bin");
}

fn copy_opencv_dlls(src_dir: &Path, dst_dir: &Path) {
    let entries = match fs::read_dir(src_dir) {
        Ok(entries) => entries,
        Err(e) => {
            println!("cargo:warning=Failed to read OpenCV DLL directory: {}", e);
            return;
        }
    };

    let mut copied_count = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        if let Some(filename) = path.file_name() {
            let filename_str = filename.to_string_lossy();

            // "opencv"で始まるDLLファイルをコピー
            if filename_str.ends_with(".dll") && filename_str.starts_with("opencv") {
                let dst_path = dst_dir.join(filename);

                // すでに同じサイズの同名ファイルが存在する場合はスキップ
                if dst_path.exists() {
                    if let (Ok(src_meta), Ok(dst_meta)) =
                        (fs::metadata(&path), fs::metadata(&dst_path))
                    {
                        if src_meta.len() == dst_meta.len() {
                            continue;
                        }
                    }
                }

                match fs::copy(&path, &dst_path) {
                    Ok(_) => {
                        copied_count += 1;
                    }
                    Err(e) => {
                        println!("cargo:warning=Failed to copy DLL {}: {}", filename_str, e);
                    }
                }
            }
        }
    }

    if copied_count > 0 {
        println!("cargo:warning=Copied {} OpenCV DLLs", copied_count);
    }
}
