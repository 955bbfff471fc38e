//! Build script rendering the `nimbus` man page into the build output
//! directory, where packaging picks it up.

use std::env;
use std::io::Write;

use camino::Utf8PathBuf;
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use clap::CommandFactory;
use clap_mangen::Man;

#[path = "src/cli/mod.rs"]
mod cli;

use cli::Cli;

const MAN_PAGE: &str = "nimbus.1";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut stdout = std::io::stdout();
    writeln!(stdout, "cargo:rerun-if-changed=build.rs")?;
    writeln!(stdout, "cargo:rerun-if-changed=src/cli/mod.rs")?;

    let out_dir = env::var_os("OUT_DIR").ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::NotFound, "OUT_DIR was not set")
    })?;
    let out_dir = Utf8PathBuf::from_path_buf(out_dir.into()).map_err(|path| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("OUT_DIR is not UTF-8: {}", path.display()),
        )
    })?;

    let mut page = Vec::new();
    Man::new(Cli::command()).render(&mut page)?;

    let dir = Dir::open_ambient_dir(&out_dir, ambient_authority())?;
    dir.write(MAN_PAGE, &page)?;

    Ok(())
}
