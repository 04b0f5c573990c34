//! Minimal container header check for inputs too large to probe

use crate::asset::ContainerKind;
use std::path::Path;
use tokio::io::AsyncReadExt;

const HEADER_LEN: usize = 12;

/// Read the first bytes of `path` and check they look like `container`
pub(crate) async fn sniff(path: &Path, container: ContainerKind) -> std::io::Result<bool> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut header = [0u8; HEADER_LEN];
    let mut filled = 0;

    // A short read is not EOF; keep going until the buffer is full or the file ends
    while filled < HEADER_LEN {
        let n = file.read(&mut header[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }

    Ok(matches_container(&header[..filled], container))
}

pub(crate) fn matches_container(header: &[u8], container: ContainerKind) -> bool {
    match container {
        ContainerKind::Wav => is_wav(header),
        ContainerKind::Mp3 => is_mp3(header),
    }
}

fn is_wav(header: &[u8]) -> bool {
    header.len() >= 12
        && matches!(&header[0..4], b"RIFF" | b"RIFX" | b"RF64")
        && &header[8..12] == b"WAVE"
}

fn is_mp3(header: &[u8]) -> bool {
    if header.starts_with(b"ID3") {
        return true;
    }
    // MPEG audio frame sync: 11 set bits, layer bits not reserved
    header.len() >= 2 && header[0] == 0xFF && header[1] & 0xE0 == 0xE0 && header[1] & 0x06 != 0
}
