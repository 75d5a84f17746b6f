use anyhow::Result;
use opendal::Operator;

/// 构建 WebDAV operator，返回 (operator, 显示名称)
pub fn build_operator(
    endpoint: &str,
    username: &str,
    password: &str,
    root: Option<&str>,
) -> Result<(Operator, String)> {
    use opendal::services::Webdav;

    let mut builder = Webdav::default()
        .endpoint(endpoint)
        .username(username)
        .password(password);

    if let Some(r) = root {
        builder = builder.root(r);
    }

    let operator = Operator::new(builder)?.finish();

    let name = format!(
        "webdav://{}{}",
        endpoint.trim_end_matches('/'),
        root.map(|r| format!("/{}", r.trim_start_matches('/')))
            .unwrap_or_default()
    );

    Ok((operator, name))
}
