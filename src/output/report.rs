use std::fmt::Write as _;

use super::GalleryView;
use crate::gallery::{GridEntry, GridLayout};
use crate::navigation::NavigationQuery;

fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn json_for_script_tag(value: &str) -> String {
    value.replace("</", "<\\/")
}

fn format_px(value: f64) -> String {
    let rounded = (value * 100.0).round() / 100.0;
    if rounded.fract() == 0.0 {
        format!("{}", rounded as i64)
    } else {
        format!("{rounded}")
    }
}

fn highlighted_name(entry: &GridEntry) -> String {
    let mut out = String::new();
    for span in entry.spans.iter() {
        if span.matched {
            let _ = write!(
                out,
                "<mark class=\"bg-emerald-200 dark:bg-emerald-700 rounded px-0.5\">{}</mark>",
                escape_html(&span.text)
            );
        } else {
            out.push_str(&escape_html(&span.text));
        }
    }
    out
}

fn render_cell(entry: &GridEntry, annotation: Option<&str>) -> String {
    let pdf = escape_html(&entry.pdf_path);
    let annotation_attr = match (annotation, entry.txt_path.as_deref()) {
        (Some(text), _) => format!(" data-annotation=\"{}\"", escape_html(text)),
        (None, Some(path)) => format!(" data-annotation-src=\"{}\"", escape_html(path)),
        (None, None) => String::new(),
    };
    format!(
        r#"<a href="{pdf}"><h4 class="font-display text-sm mb-2 break-all">{name}</h4></a><a href="{pdf}"><img id="img_{index}" class="gallery-thumb mx-auto" src="{png}" width="{width}" height="{height}" alt="{alt}"{annotation_attr}/></a>"#,
        name = highlighted_name(entry),
        index = entry.index,
        png = escape_html(&entry.png_path),
        width = format_px(entry.width),
        height = format_px(entry.height),
        alt = escape_html(&entry.name),
    )
}

fn render_grid(layout: &GridLayout, view: &GalleryView) -> String {
    let mut out = String::new();
    for row in layout.rows.iter() {
        out.push_str("        <div class=\"row grid gap-5 mb-5\" style=\"grid-template-columns: repeat(");
        let _ = write!(out, "{}", layout.columns);
        out.push_str(", minmax(0, 1fr));\">\n");
        for cell in row.cells.iter() {
            let _ = write!(
                out,
                "          <div id=\"grid_{}\" class=\"text-center\">",
                cell.slot
            );
            if let Some(entry) = cell.entry.as_ref() {
                let annotation = view.annotations.get(&entry.index).map(|s| s.as_str());
                out.push_str(&render_cell(entry, annotation));
            }
            out.push_str("</div>\n");
        }
        out.push_str("        </div>\n");
    }
    if layout.rows.is_empty() {
        out.push_str("        <p class=\"text-slate-500 dark:text-slate-400 font-medium\">No plots match the current search.</p>\n");
    }
    out
}

fn info_row(label: &str, id: &str, value: &str) -> String {
    format!(
        "<tr><th class=\"px-4 py-2 text-[11px] uppercase tracking-widest text-left\">{label}</th><td id=\"{id}\" class=\"px-4 py-2 text-sm font-semibold\">{}</td></tr>",
        escape_html(value)
    )
}

fn render_context(view: &GalleryView) -> String {
    let Some(ctx) = view.context.as_ref() else {
        return String::new();
    };
    if view.shows_info_table() {
        let rows = [
            info_row("Data run", "data_text", &ctx.data_run),
            info_row("Reference run", "ref_text", &ctx.ref_run),
            info_row("Series", "series_text", &ctx.series),
            info_row("Sample", "sample_text", &ctx.sample),
            info_row("Subsystem", "subsys_text", &ctx.subsystem),
        ];
        return format!(
            "<table id=\"info_table\" class=\"bg-white dark:bg-slate-900 rounded-2xl border border-slate-200 dark:border-slate-800 mb-8\">{}</table>",
            rows.join("")
        );
    }
    if view.shows_title_wells() {
        return format!(
            "<div id=\"title_wells\" class=\"flex gap-4 mb-8\"><div class=\"rounded-xl border border-slate-200 dark:border-slate-800 px-4 py-3\">Data <span id=\"data_title\" class=\"font-bold\">{}</span></div><div class=\"rounded-xl border border-slate-200 dark:border-slate-800 px-4 py-3\">Reference <span id=\"ref_title\" class=\"font-bold\">{}</span></div></div>",
            escape_html(&ctx.data_run),
            escape_html(&ctx.ref_run)
        );
    }
    String::new()
}

fn nav_button(id: &str, label: &str, query: Option<&NavigationQuery>) -> String {
    match query.and_then(|q| serde_json::to_string(q).ok()) {
        Some(json) => format!(
            "<button id=\"{id}\" class=\"nav-run px-4 py-2 rounded-lg bg-primary text-white text-xs font-bold\" type=\"button\" data-query=\"{}\">{label}</button>",
            escape_html(&json)
        ),
        None => format!(
            "<button id=\"{id}\" class=\"px-4 py-2 rounded-lg bg-slate-200 dark:bg-slate-700 text-slate-500 text-xs font-bold opacity-50\" type=\"button\" disabled=\"disabled\">{label}</button>"
        ),
    }
}

/// Re-filters on every load and search: the fragment wins on the first load,
/// visible items fill the grid positionally, matches are marked.
const PAGE_SCRIPT: &str = r#"    (function() {
      const state = JSON.parse(document.getElementById('gallery-state').textContent || '{}');
      const items = state.items || [];
      const columns = Math.max(1, state.columns || 3);
      const annotations = state.annotations || {};
      const section = document.getElementById('section_1');
      const total = document.getElementById('results-total');
      const input = document.getElementById('search');
      const preview = document.getElementById('preview');
      const tooltip = document.getElementById('tooltip');
      let hovered = 0;

      function showTooltip(text) {
        tooltip.textContent = text;
        tooltip.classList.remove('hidden');
      }

      function hideTooltip() {
        tooltip.textContent = '';
        tooltip.classList.add('hidden');
      }

      function highlighted(name, term) {
        const out = document.createDocumentFragment();
        if (!term) {
          out.appendChild(document.createTextNode(name));
          return out;
        }
        const parts = name.split(term);
        parts.forEach(function(part, i) {
          if (part) {
            out.appendChild(document.createTextNode(part));
          }
          if (i < parts.length - 1) {
            const mark = document.createElement('mark');
            mark.className = 'bg-emerald-200 dark:bg-emerald-700 rounded px-0.5';
            mark.textContent = term;
            out.appendChild(mark);
          }
        });
        return out;
      }

      function pdfLink(item, child) {
        const a = document.createElement('a');
        a.href = item.pdf_path;
        a.appendChild(child);
        return a;
      }

      function cell(item, term) {
        const out = document.createDocumentFragment();
        const title = document.createElement('h4');
        title.className = 'font-display text-sm mb-2 break-all';
        title.appendChild(highlighted(item.name, term));
        out.appendChild(pdfLink(item, title));
        const img = document.createElement('img');
        img.id = 'img_' + item.index;
        img.className = 'gallery-thumb mx-auto';
        img.src = item.png_path;
        img.width = item.width;
        img.height = item.height;
        img.alt = item.name;
        out.appendChild(pdfLink(item, img));
        return out;
      }

      function render(term) {
        const visible = items.filter(function(item) { return item.name.indexOf(term) !== -1; });
        section.replaceChildren();
        for (let start = 0; start < visible.length; start += columns) {
          const row = document.createElement('div');
          row.className = 'row grid gap-5 mb-5';
          row.style.gridTemplateColumns = 'repeat(' + columns + ', minmax(0, 1fr))';
          for (let slot = start; slot < start + columns; slot++) {
            const holder = document.createElement('div');
            holder.id = 'grid_' + slot;
            holder.className = 'text-center';
            if (slot < visible.length) {
              holder.appendChild(cell(visible[slot], term));
            }
            row.appendChild(holder);
          }
          section.appendChild(row);
        }
        if (!visible.length) {
          const empty = document.createElement('p');
          empty.className = 'text-slate-500 dark:text-slate-400 font-medium';
          empty.textContent = 'No plots match the current search.';
          section.appendChild(empty);
        }
        total.textContent = visible.length + ' of ' + items.length + ' shown';
      }

      section.addEventListener('mouseover', function(ev) {
        const img = ev.target.closest('img[id^=img_]');
        if (!img) {
          return;
        }
        preview.src = img.src;
        const index = Number(img.id.slice(4));
        const item = items.find(function(i) { return i.index === index; });
        const ticket = ++hovered;
        if (item && annotations[index] !== undefined) {
          showTooltip(annotations[index]);
        } else if (item && item.txt_path) {
          fetch(item.txt_path)
            .then(function(r) {
              if (!r.ok) {
                throw new Error('annotation ' + r.status);
              }
              return r.text();
            })
            .then(function(t) { if (ticket === hovered) showTooltip(t); })
            .catch(function() { if (ticket === hovered) hideTooltip(); });
        } else {
          hideTooltip();
        }
      });

      let fragment = '';
      try {
        fragment = decodeURIComponent(window.location.hash.replace(/^#/, ''));
      } catch (e) {
        fragment = window.location.hash.replace(/^#/, '');
      }
      const initial = fragment || state.search || '';
      input.value = initial;
      render(initial);

      document.getElementById('search-form').addEventListener('submit', function(ev) {
        ev.preventDefault();
        const term = input.value;
        window.location.hash = term;
        render(term);
      });

      for (const btn of document.querySelectorAll('button.nav-run')) {
        btn.addEventListener('click', function() {
          localStorage.setItem('external_query', btn.getAttribute('data-query'));
          document.location.href = './';
        });
      }

      if (state.context) {
        localStorage.setItem('data', state.context.data_run);
        localStorage.setItem('ref', state.context.ref_run);
        localStorage.setItem('user_id', state.context.user_id);
        localStorage.setItem('series', state.context.series);
        localStorage.setItem('sample', state.context.sample);
        localStorage.setItem('subsystem', state.context.subsystem);
      }
    })();"#;

pub fn render_html(view: &GalleryView) -> Vec<u8> {
    let state = serde_json::json!({
        "search": view.search,
        "columns": view.layout.columns,
        "items": view.items,
        "context": view.context,
        "annotations": view.annotations,
    });
    let state = json_for_script_tag(&state.to_string());

    let context = render_context(view);
    let grid = render_grid(&view.layout, view);
    let search = escape_html(&view.search);
    let (next_button, prev_button) = match view.navigation.as_ref() {
        Some(nav) => (
            nav_button("next_run", "Next run", nav.next.as_ref()),
            nav_button("prev_run", "Previous run", nav.previous.as_ref()),
        ),
        None => (
            nav_button("next_run", "Next run", None),
            nav_button("prev_run", "Previous run", None),
        ),
    };
    let total = view.total;
    let visible = view.visible;

    let script = PAGE_SCRIPT;
    let html = format!(
        r####"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8"/>
  <meta content="width=device-width, initial-scale=1.0" name="viewport"/>
  <title>Plot Gallery</title>
  <script src="https://cdn.tailwindcss.com?plugins=forms,container-queries"></script>
  <link href="https://fonts.googleapis.com/css2?family=Montserrat:wght@700;800&amp;family=Inter:wght@400;500;600;700&amp;display=swap" rel="stylesheet"/>
  <script id="tailwind-config">
    tailwind.config = {{
      darkMode: "class",
      theme: {{
        extend: {{
          colors: {{
            "primary": "#135bec",
            "background-light": "#f8fafc",
            "background-dark": "#0f172a"
          }},
          fontFamily: {{
            "sans": ["Inter", "sans-serif"],
            "display": ["Montserrat", "sans-serif"]
          }}
        }}
      }}
    }};
  </script>
</head>
<body class="bg-background-light dark:bg-background-dark text-slate-900 dark:text-slate-100 min-h-screen">
  <script type="application/json" id="gallery-state">{state}</script>
  <main class="max-w-[1440px] mx-auto w-full px-8 py-10">
    <div class="flex flex-col md:flex-row justify-between items-start md:items-end mb-8 gap-4">
      <div>
        <h1 class="font-display text-4xl mb-2">PLOTS</h1>
        <p id="results-total" class="text-slate-500 dark:text-slate-400 text-sm font-bold">{visible} of {total} shown</p>
      </div>
      <div class="flex items-center gap-3">
        {prev_button}
        {next_button}
      </div>
    </div>

    {context}

    <form id="search-form" class="flex items-center gap-3 bg-white dark:bg-slate-900 rounded-xl px-4 py-3 border border-slate-200 dark:border-slate-700 mb-8">
      <input id="search" name="search" value="{search}" class="bg-transparent border-none focus:ring-0 text-sm w-full" placeholder="Filter plots by name..." type="text"/>
      <button class="px-4 py-2 rounded-lg bg-primary text-white text-xs font-bold" type="submit">FILTER</button>
    </form>

    <div class="flex gap-8 items-start">
      <div id="section_1" class="flex-1">
{grid}      </div>
      <aside class="hidden xl:block w-[420px] sticky top-6">
        <img id="preview" class="w-full rounded-xl border border-slate-200 dark:border-slate-800" alt=""/>
        <pre id="tooltip" class="hidden mt-4 text-xs whitespace-pre-wrap bg-white dark:bg-slate-900 rounded-xl border border-slate-200 dark:border-slate-800 p-4"></pre>
      </aside>
    </div>
  </main>

  <script>
{script}
  </script>
</body>
</html>"####,
    );

    html.into_bytes()
}
