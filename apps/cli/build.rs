fn main() {
    if std::env::var("CARGO_CFG_TARGET_OS").as_deref() != Ok("windows") {
        return;
    }

    // Add Windows Kit bin path to PATH for this process so winres can find rc.exe
    if let Ok(path) = std::env::var("PATH") {
        let kit_path = r"C:\Program Files (x86)\Windows Kits\10\bin\10.0.22621.0\x64";
        std::env::set_var("PATH", format!("{};{}", kit_path, path));
    }

    let mut res = winres::WindowsResource::new();
    res.set("FileDescription", "Windows keyboard layout reverse tool");
    res.set("ProductName", "kbdreverse");
    res.set("OriginalFilename", "kbdreverse.exe");
    if let Err(e) = res.compile() {
        println!("cargo:warning=Cannot compile version resources: {}", e);
    }
}
