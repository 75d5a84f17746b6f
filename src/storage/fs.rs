//! 本地目录作为远程存储（例如挂载的网盘目录）

use anyhow::Result;
use opendal::Operator;
use std::path::Path;

pub fn build_operator(root: &str) -> Result<(Operator, String)> {
    use opendal::services::Fs;

    if !Path::new(root).exists() {
        std::fs::create_dir_all(root)?;
    }

    let operator = Operator::new(Fs::default().root(root))?.finish();
    Ok((operator, format!("fs:{}", root)))
}
