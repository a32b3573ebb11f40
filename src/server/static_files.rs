//! The single HTML page served at `/`

use axum::response::Html;

/// Index handler: lookup form plus upload, process and download flow
pub async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>Parent Company Finder</title>
    <style>
        body {
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            max-width: 720px;
            margin: 50px auto;
            padding: 20px;
            background: #1a1a2e;
            color: #eee;
        }
        h1 { color: #4ade80; }
        section {
            background: #2a2a4e;
            padding: 16px;
            border-radius: 8px;
            margin: 16px 0;
        }
        input, button { font-size: 1em; padding: 6px 10px; margin: 4px 0; }
        .error { color: #f87171; }
        pre { white-space: pre-wrap; }
    </style>
</head>
<body>
    <h1>Parent Company Finder</h1>

    <section>
        <h2>Look up one company</h2>
        <form id="lookup-form">
            <input id="company-name" name="company_name" placeholder="Company name">
            <button type="submit">Find parent</button>
        </form>
        <pre id="lookup-result"></pre>
    </section>

    <section>
        <h2>Process a spreadsheet</h2>
        <p>CSV, XLSX, XLSM, XLS or ODS. Company names go in the first column.</p>
        <form id="upload-form">
            <input id="file" type="file" name="file" accept=".csv,.xlsx,.xlsm,.xls,.ods">
            <button type="submit">Upload and process</button>
        </form>
        <pre id="upload-result"></pre>
    </section>

    <script>
        const show = (el, text, isError) => {
            el.textContent = text;
            el.className = isError ? 'error' : '';
        };

        document.getElementById('lookup-form').addEventListener('submit', async (ev) => {
            ev.preventDefault();
            const out = document.getElementById('lookup-result');
            show(out, 'Looking up...', false);
            const res = await fetch('/lookup', {
                method: 'POST',
                headers: { 'Content-Type': 'application/json' },
                body: JSON.stringify({ company_name: document.getElementById('company-name').value }),
            });
            const body = await res.json();
            if (body.error) {
                show(out, body.error, true);
            } else {
                show(out, 'Parent: ' + body.parent_company + '\n\n' + body.description, false);
            }
        });

        document.getElementById('upload-form').addEventListener('submit', async (ev) => {
            ev.preventDefault();
            const out = document.getElementById('upload-result');
            const data = new FormData();
            data.append('file', document.getElementById('file').files[0]);

            show(out, 'Uploading...', false);
            const up = await fetch('/upload', { method: 'POST', body: data });
            const upBody = await up.json();
            if (!up.ok) { show(out, upBody.error, true); return; }

            show(out, 'Processing ' + upBody.total_companies + ' companies...', false);
            const proc = await fetch('/process', {
                method: 'POST',
                headers: { 'Content-Type': 'application/json' },
                body: JSON.stringify({ filename: upBody.filename }),
            });
            const procBody = await proc.json();
            if (!proc.ok) { show(out, procBody.error, true); return; }

            show(out, 'Done: ' + procBody.summary.looked_up + ' looked up, '
                + procBody.summary.failed + ' failed.', false);
            window.location = '/download/' + encodeURIComponent(procBody.output_filename);
        });
    </script>
</body>
</html>"#;
